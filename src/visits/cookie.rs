use axum::http::{header, HeaderMap, HeaderValue};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use tower_sessions::cookie::{Cookie, SameSite};

use super::{parse_timestamp, CookieSigner, PerClientStore, LAST_VISIT_KEY, VISITS_KEY};

/// Cookie timestamps carry microseconds after the logical timestamp
const COOKIE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Length of the `.ffffff` fragment stripped before parsing
const FRAGMENT_LEN: usize = 7;

/// Visit entries kept in the client's cookie jar.
///
/// Reads come from the request's `Cookie` headers; writes are queued and
/// turned into `Set-Cookie` headers by [`CookieStore::into_headers`].
#[derive(Debug, Default)]
pub struct CookieStore {
    values: HashMap<String, String>,
    pending: Vec<Cookie<'static>>,
    signer: Option<CookieSigner>,
}

impl CookieStore {
    pub fn from_headers(headers: &HeaderMap, signer: Option<CookieSigner>) -> Self {
        let mut values = HashMap::new();

        for header_value in headers.get_all(header::COOKIE) {
            let Ok(raw) = header_value.to_str() else {
                continue;
            };

            for cookie in Cookie::split_parse(raw).flatten() {
                let name = cookie.name();
                if name != VISITS_KEY && name != LAST_VISIT_KEY {
                    continue;
                }

                let value = cookie.value_trimmed();
                let value = match &signer {
                    Some(signer) => match signer.verify(name, value) {
                        Ok(value) => value,
                        Err(err) => {
                            tracing::debug!(cookie = name, error = %err, "ignoring unsigned visit cookie");
                            continue;
                        }
                    },
                    None => value.to_string(),
                };

                values.insert(name.to_string(), value);
            }
        }

        Self {
            values,
            pending: Vec::new(),
            signer,
        }
    }

    /// `Set-Cookie` headers for every entry written during this request
    pub fn into_headers(self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        for cookie in self.pending {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(err) => {
                    tracing::warn!(cookie = cookie.name(), error = %err, "dropping unencodable cookie");
                }
            }
        }

        headers
    }
}

impl PerClientStore for CookieStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        let wire_value = match &self.signer {
            Some(signer) => match signer.sign(key, &value) {
                Ok(signed) => signed,
                Err(err) => {
                    tracing::warn!(cookie = key, error = %err, "failed to sign visit cookie");
                    return;
                }
            },
            None => value.clone(),
        };

        // Timestamps contain a space, so quote them
        let wire_value = if wire_value.contains(' ') {
            format!("\"{}\"", wire_value)
        } else {
            wire_value
        };

        let cookie = Cookie::build((key.to_string(), wire_value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();

        self.pending.retain(|queued| queued.name() != key);
        self.pending.push(cookie);
        self.values.insert(key.to_string(), value);
    }

    fn encode_timestamp(&self, at: NaiveDateTime) -> String {
        at.format(COOKIE_TIMESTAMP_FORMAT).to_string()
    }

    fn decode_timestamp(&self, raw: &str) -> Option<NaiveDateTime> {
        let end = raw.len().checked_sub(FRAGMENT_LEN)?;
        parse_timestamp(raw.get(..end)?)
    }
}
