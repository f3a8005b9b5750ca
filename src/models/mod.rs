mod category;
mod page;

pub use category::{slugify, Category, MAX_NAME_LEN};
pub use page::{Page, MAX_TITLE_LEN};
