use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rango::config::Config;
use rango::models::{slugify, Category};
use rango::storage::{SqliteStorage, Storage, StorageError};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rango-admin")]
#[command(about = "Rango catalog management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a category
    AddCategory {
        /// Category name (the slug is derived from it)
        name: String,
        #[arg(long, default_value_t = 0)]
        views: i64,
        #[arg(long, default_value_t = 0)]
        likes: i64,
    },
    /// Add a page to an existing category
    AddPage {
        /// Slug of the category
        category: String,
        title: String,
        url: String,
        #[arg(long, default_value_t = 0)]
        views: i64,
    },
    /// List categories and their pages
    List,
    /// Load the sample catalog, skipping entries that already exist
    Populate,
}

struct SamplePage {
    title: &'static str,
    url: &'static str,
    views: i64,
}

struct SampleCategory {
    name: &'static str,
    views: i64,
    likes: i64,
    pages: &'static [SamplePage],
}

const SAMPLE_CATALOG: &[SampleCategory] = &[
    SampleCategory {
        name: "Python",
        views: 128,
        likes: 64,
        pages: &[
            SamplePage {
                title: "Official Python Tutorial",
                url: "http://docs.python.org/2/tutorial/",
                views: 32,
            },
            SamplePage {
                title: "How to Think like a Computer Scientist",
                url: "http://www.greenteapress.com/thinkpython/",
                views: 16,
            },
            SamplePage {
                title: "Learn Python in 10 Minutes",
                url: "http://www.korokithakis.net/tutorials/python/",
                views: 8,
            },
        ],
    },
    SampleCategory {
        name: "Django",
        views: 64,
        likes: 32,
        pages: &[
            SamplePage {
                title: "Official Django Tutorial",
                url: "https://docs.djangoproject.com/en/1.7/intro/tutorial01/",
                views: 64,
            },
            SamplePage {
                title: "Django Rocks",
                url: "http://www.djangorocks.com/",
                views: 4,
            },
            SamplePage {
                title: "How to Tango with Django",
                url: "http://www.tangowithdjango.com/",
                views: 128,
            },
        ],
    },
    SampleCategory {
        name: "Other Frameworks",
        views: 32,
        likes: 16,
        pages: &[
            SamplePage {
                title: "Bottle",
                url: "http://bottlepy.org/docs/dev/",
                views: 2,
            },
            SamplePage {
                title: "Flask",
                url: "http://flask.pocoo.org",
                views: 1,
            },
        ],
    },
];

async fn ensure_category(storage: &dyn Storage, sample: &SampleCategory) -> Result<Category> {
    match storage
        .create_category(sample.name, sample.views, sample.likes)
        .await
    {
        Ok(category) => {
            println!("✓ Added category '{}'", category.name);
            Ok(category)
        }
        Err(StorageError::Conflict) => storage
            .get_category(&slugify(sample.name))
            .await?
            .with_context(|| format!("category '{}' conflicts with another slug", sample.name)),
        Err(e) => Err(e.into()),
    }
}

async fn populate(storage: &dyn Storage) -> Result<()> {
    for sample in SAMPLE_CATALOG {
        let category = ensure_category(storage, sample).await?;
        let existing = storage.pages_for_category(category.id).await?;

        for page in sample.pages {
            if existing.iter().any(|p| p.title == page.title) {
                continue;
            }
            storage
                .create_page(&category.slug, page.title, page.url, page.views)
                .await?;
            println!("  ✓ Added page '{}'", page.title);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = Arc::new(
        SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
    );

    // Ensure database is initialized
    storage.init().await?;

    match cli.command {
        Commands::AddCategory { name, views, likes } => {
            let category = storage.create_category(&name, views, likes).await?;
            println!(
                "✓ Added category '{}' (slug '{}')",
                category.name, category.slug
            );
        }
        Commands::AddPage {
            category,
            title,
            url,
            views,
        } => {
            let page = storage.create_page(&category, &title, &url, views).await?;
            println!("✓ Added page '{}' to '{}'", page.title, category);
        }
        Commands::List => {
            let categories = storage.list_categories(None).await?;
            if categories.is_empty() {
                println!("No categories found.");
            }
            for category in categories {
                println!(
                    "{} [{}] views={} likes={}",
                    category.name, category.slug, category.views, category.likes
                );
                for page in storage.pages_for_category(category.id).await? {
                    println!("    {:<45} {:>6}  {}", page.title, page.views, page.url);
                }
            }
        }
        Commands::Populate => {
            populate(storage.as_ref()).await?;
            println!("Catalog populated.");
        }
    }

    Ok(())
}
