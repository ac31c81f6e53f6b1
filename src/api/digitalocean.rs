//! DigitalOcean v2 REST client (blocking).
//!
//! Endpoints:
//!   GET    droplets?tag_name=TAG            - субъекты
//!   GET    droplets/{id}/snapshots          - снимки дроплета
//!   POST   droplets/{id}/actions  {snapshot} - создать снимок
//!   DELETE snapshots/{id}                   - удалить снимок
//!   POST   images/{id}/actions    {transfer} - перенести снимок в регион
//!
//! Листинги постраничные: следуем links.pages.next, пока он есть.
//!
//! Status mapping: 401/403 -> Auth, 429 and 5xx -> TransientNetwork,
//! other 4xx -> Api. Transport failures are TransientNetwork. Nothing is retried.

use std::time::Duration;

use log::{debug, error};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::api::{Action, SnapshotApi};
use crate::error::{Error, Result};
use crate::snapshot::{Snapshot, Subject};
use crate::token::ApiToken;

pub const DEFAULT_API_URL: &str = "https://api.digitalocean.com/v2/";

const PER_PAGE: u32 = 200;
// страховка от зацикленной пагинации
const MAX_PAGES: usize = 1000;
const TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Default, Deserialize)]
struct Links {
    #[serde(default)]
    pages: Option<Pages>,
}

#[derive(Debug, Default, Deserialize)]
struct Pages {
    #[serde(default)]
    next: Option<String>,
}

impl Links {
    fn next(self) -> Option<String> {
        self.pages.and_then(|p| p.next)
    }
}

#[derive(Debug, Deserialize)]
struct DropletPage {
    droplets: Vec<Subject>,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Deserialize)]
struct SnapshotPage {
    snapshots: Vec<Snapshot>,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Deserialize)]
struct ActionEnvelope {
    action: Action,
}

pub struct DigitalOcean {
    client: Client,
    base_url: String,
    token: ApiToken,
}

impl DigitalOcean {
    pub fn new(base_url: &str, token: ApiToken) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(concat!("do-snapshot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::transient("create HTTP client", e))?;
        let mut base_url = base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
        let resp = req
            .bearer_auth(self.token.expose())
            .send()
            .map_err(|e| Error::transient(format!("{}: request failed", what), e))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let code = status.as_u16();
        let body = resp.text().unwrap_or_default();
        error!("api call {} failed with status {}: {}", what, code, body);
        Err(classify(code, what, body))
    }

    fn get_json<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
        let resp = self.send(req, what)?;
        resp.json::<T>()
            .map_err(|e| Error::transient(format!("{}: malformed response", what), e))
    }

    fn post_action(&self, path: &str, payload: serde_json::Value, what: &str) -> Result<Action> {
        let url = self.url(path);
        debug!("POST {} payload={}", url, payload);
        let resp = self.send(self.client.post(&url).json(&payload), what)?;
        let env: ActionEnvelope = resp
            .json()
            .map_err(|e| Error::transient(format!("{}: malformed response", what), e))?;
        Ok(env.action)
    }

    /// Walk `links.pages.next` starting from `path` with `query`.
    /// Ссылка next уже содержит query целиком, к ней параметры не добавляются.
    fn collect_pages<P, T>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        what: &str,
        split: impl Fn(P) -> (Vec<T>, Links),
    ) -> Result<Vec<T>>
    where
        P: DeserializeOwned,
    {
        let first = self.url(path);
        debug!("GET {} {:?}", first, query);
        let mut req = Some(self.client.get(&first).query(query));
        let mut out = Vec::new();
        let mut pages = 0usize;
        while let Some(r) = req.take() {
            pages += 1;
            if pages > MAX_PAGES {
                return Err(Error::Api {
                    status: 0,
                    body: format!("{}: more than {} pages", what, MAX_PAGES),
                });
            }
            let page: P = self.get_json(r, what)?;
            let (items, links) = split(page);
            out.extend(items);
            req = links.next().map(|url| {
                debug!("GET {}", url);
                self.client.get(url)
            });
        }
        Ok(out)
    }
}

fn classify(code: u16, what: &str, body: String) -> Error {
    match code {
        401 | 403 => Error::Auth(format!("{}: HTTP {}: {}", what, code, body)),
        429 | 500..=599 => Error::TransientNetwork {
            message: format!("{}: HTTP {}: {}", what, code, body),
            source: None,
        },
        _ => Error::Api { status: code, body },
    }
}

impl SnapshotApi for DigitalOcean {
    fn list_subjects(&self, tag: &str) -> Result<Vec<Subject>> {
        let per_page = PER_PAGE.to_string();
        self.collect_pages(
            "droplets",
            &[("tag_name", tag), ("per_page", per_page.as_str())],
            "list droplets",
            |p: DropletPage| (p.droplets, p.links),
        )
    }

    fn list_snapshots(&self, subject: &Subject) -> Result<Vec<Snapshot>> {
        let per_page = PER_PAGE.to_string();
        self.collect_pages(
            &format!("droplets/{}/snapshots", subject.id),
            &[("per_page", per_page.as_str())],
            "list snapshots",
            |p: SnapshotPage| (p.snapshots, p.links),
        )
    }

    fn create_snapshot(&self, subject: &Subject, name: &str) -> Result<Action> {
        self.post_action(
            &format!("droplets/{}/actions", subject.id),
            json!({"type": "snapshot", "name": name}),
            "create snapshot",
        )
    }

    fn delete_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let url = self.url(&format!("snapshots/{}", snapshot.id));
        debug!("DELETE {}", url);
        self.send(self.client.delete(&url), "delete snapshot")?;
        Ok(())
    }

    fn transfer_snapshot(&self, snapshot: &Snapshot, region: &str) -> Result<Action> {
        self.post_action(
            &format!("images/{}/actions", snapshot.id),
            json!({"type": "transfer", "region": region}),
            "transfer snapshot",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(classify(401, "x", String::new()), Error::Auth(_)));
        assert!(matches!(classify(403, "x", String::new()), Error::Auth(_)));
        assert!(classify(429, "x", String::new()).is_retryable());
        assert!(classify(503, "x", String::new()).is_retryable());
        assert!(matches!(
            classify(404, "x", "gone".into()),
            Error::Api { status: 404, .. }
        ));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let token = ApiToken::new("0".repeat(64));
        let api = DigitalOcean::new("http://127.0.0.1:1/v2", token).unwrap();
        assert_eq!(api.base_url(), "http://127.0.0.1:1/v2/");
        assert_eq!(api.url("/droplets"), "http://127.0.0.1:1/v2/droplets");
    }

    #[test]
    fn parses_pagination_links() {
        let raw = r#"{"droplets":[{"id":1,"name":"a","status":"active"}],
                     "links":{"pages":{"next":"https://api/v2/droplets?page=2"}},
                     "meta":{"total":2}}"#;
        let p: DropletPage = serde_json::from_str(raw).unwrap();
        assert_eq!(p.droplets.len(), 1);
        assert_eq!(p.links.next().as_deref(), Some("https://api/v2/droplets?page=2"));

        let last: SnapshotPage = serde_json::from_str(r#"{"snapshots":[],"links":{}}"#).unwrap();
        assert!(last.links.next().is_none());
    }
}
