use crate::error::TransportError;
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

pub const ECP_DEFAULT_PORT: u16 = 8060;
const REQUEST_TIMEOUT_SECS: u64 = 6;

/// Scheme plus `host:port` of a Roku on the local network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAddress {
    scheme: String,
    host_port: String,
}

impl DeviceAddress {
    /// Accepts `host`, `host:port` or a full `http(s)://` URL; anything after the
    /// host is dropped and the ECP port is assumed when none is given.
    pub fn parse(raw: &str) -> Result<Self, TransportError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TransportError::InvalidAddress(
                "Missing Roku IP address.".to_string(),
            ));
        }

        let lower = trimmed.to_ascii_lowercase();
        let (scheme, remainder) = if lower.starts_with("http://") {
            ("http", &trimmed["http://".len()..])
        } else if lower.starts_with("https://") {
            ("https", &trimmed["https://".len()..])
        } else {
            ("http", trimmed)
        };

        let host_port = remainder.split('/').next().unwrap_or_default();
        if host_port.is_empty() {
            return Err(TransportError::InvalidAddress(trimmed.to_string()));
        }
        let host_port = if host_port.contains(':') {
            host_port.to_string()
        } else {
            format!("{}:{}", host_port, ECP_DEFAULT_PORT)
        };

        Ok(Self {
            scheme: scheme.to_string(),
            host_port,
        })
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host_port)
    }

    pub fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url(), endpoint)
        } else {
            format!("{}/{}", self.base_url(), endpoint)
        }
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url())
    }
}

/// Percent-encodes a path segment like `encodeURIComponent`, but leaves
/// already-encoded `%XX` sequences (e.g. `Lit_%20`) intact.
pub fn encode_path_segment(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let is_escape = b == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit();
        if is_escape {
            out.push_str(&segment[i..i + 3]);
            i += 3;
            continue;
        }
        match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
        i += 1;
    }
    out
}

/// The two device commands macros need.
pub trait DeviceTransport: Send + Sync {
    fn send_key_press(
        &self,
        device: &DeviceAddress,
        key: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// `params` is a raw query-string fragment appended after `?` when non-empty.
    fn launch_app(
        &self,
        device: &DeviceAddress,
        app_id: &str,
        params: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl<T: DeviceTransport> DeviceTransport for Arc<T> {
    fn send_key_press(
        &self,
        device: &DeviceAddress,
        key: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).send_key_press(device, key)
    }

    fn launch_app(
        &self,
        device: &DeviceAddress,
        app_id: &str,
        params: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).launch_app(device, app_id, params)
    }
}

pub fn keypress_endpoint(key: &str) -> String {
    format!("/keypress/{}", encode_path_segment(key))
}

pub fn launch_endpoint(app_id: &str, params: &str) -> String {
    let mut endpoint = format!("/launch/{}", encode_path_segment(app_id));
    if !params.is_empty() {
        endpoint.push('?');
        endpoint.push_str(params);
    }
    endpoint
}

static APP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<app\b(?P<attrs>[^>]*)>(?P<name>[^<]*)</app>").expect("app pattern is valid")
});

static PLAYER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<player\b(?P<attrs>[^>]*?)/?>").expect("player pattern is valid")
});

static PLUGIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<plugin\b(?P<attrs>[^>]*?)/?>").expect("plugin pattern is valid")
});

static ATTRIBUTE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?P<key>[\w-]+)="(?P<value>[^"]*)""#).expect("attribute pattern is valid")
});

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub friendly_name: String,
    pub model_name: String,
    pub serial_number: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ActiveApp {
    pub id: Option<String>,
    pub name: String,
    pub version: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct InstalledApp {
    pub id: String,
    pub name: String,
}

/// Playback details from `/query/media-player`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MediaPlayer {
    /// `play`, `pause`, `buffer`, `close`...
    pub state: String,
    pub error: bool,
    pub plugin_id: Option<String>,
    pub plugin_name: Option<String>,
    pub position_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    pub is_live: Option<bool>,
}

fn tag_text(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    let text = xml[start..end].trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn attribute<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    ATTRIBUTE_PATTERN
        .captures_iter(attrs)
        .find(|attr| &attr["key"] == name)
        .and_then(|attr| attr.name("value"))
        .map(|value| value.as_str())
}

/// `12345 ms` or `12345`.
fn parse_millis(text: &str) -> Option<u64> {
    text.trim().trim_end_matches("ms").trim().parse().ok()
}

/// Reads the few `/query/device-info` fields shown to the user; missing ones
/// read as `Unknown`.
pub fn parse_device_info(xml: &str) -> DeviceInfo {
    let field = |tag| tag_text(xml, tag).unwrap_or_else(|| "Unknown".to_string());
    DeviceInfo {
        friendly_name: field("friendly-device-name"),
        model_name: field("model-name"),
        serial_number: field("serial-number"),
    }
}

/// `None` when the reply carries no `<app>` element.
pub fn parse_active_app(xml: &str) -> Option<ActiveApp> {
    let caps = APP_PATTERN.captures(xml)?;
    let attrs = &caps["attrs"];
    Some(ActiveApp {
        id: attribute(attrs, "id").map(str::to_string),
        name: caps["name"].trim().to_string(),
        version: attribute(attrs, "version").map(str::to_string),
    })
}

/// Every `<app>` of `/query/apps`. Entries without an id are skipped and blank
/// names read as `App {id}`.
pub fn parse_apps(xml: &str) -> Vec<InstalledApp> {
    APP_PATTERN
        .captures_iter(xml)
        .filter_map(|caps| {
            let id = attribute(&caps["attrs"], "id")?.trim();
            if id.is_empty() {
                return None;
            }
            let name = caps["name"].trim();
            Some(InstalledApp {
                id: id.to_string(),
                name: if name.is_empty() {
                    format!("App {}", id)
                } else {
                    name.to_string()
                },
            })
        })
        .collect()
}

/// `None` when the reply has no `<player>` element.
pub fn parse_media_player(xml: &str) -> Option<MediaPlayer> {
    let player = PLAYER_PATTERN.captures(xml)?;
    let attrs = &player["attrs"];
    let plugin = PLUGIN_PATTERN.captures(xml);
    let plugin_attr = |name| {
        plugin
            .as_ref()
            .and_then(|caps| attribute(&caps["attrs"], name))
            .map(str::to_string)
    };
    Some(MediaPlayer {
        state: attribute(attrs, "state").unwrap_or("unknown").to_string(),
        error: attribute(attrs, "error") == Some("true"),
        plugin_id: plugin_attr("id"),
        plugin_name: plugin_attr("name"),
        position_ms: tag_text(xml, "position").as_deref().and_then(parse_millis),
        duration_ms: tag_text(xml, "duration").as_deref().and_then(parse_millis),
        is_live: tag_text(xml, "is_live").map(|live| live == "true"),
    })
}

/// External Control Protocol client over plain HTTP.
#[derive(Clone)]
pub struct RokuHttpClient {
    client: Client,
}

impl RokuHttpClient {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self { client })
    }

    pub async fn post(&self, device: &DeviceAddress, endpoint: &str) -> Result<(), TransportError> {
        let url = device.url(endpoint);
        log::debug!("POST {}", url);
        self.client
            .post(&url)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn get_text(
        &self,
        device: &DeviceAddress,
        endpoint: &str,
    ) -> Result<String, TransportError> {
        let url = device.url(endpoint);
        log::debug!("GET {}", url);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    pub async fn device_info(&self, device: &DeviceAddress) -> Result<DeviceInfo, TransportError> {
        let xml = self.get_text(device, "/query/device-info").await?;
        Ok(parse_device_info(&xml))
    }

    pub async fn active_app(
        &self,
        device: &DeviceAddress,
    ) -> Result<Option<ActiveApp>, TransportError> {
        let xml = self.get_text(device, "/query/active-app").await?;
        Ok(parse_active_app(&xml))
    }

    /// Some firmware answers 403 here when third-party control is limited.
    pub async fn apps(&self, device: &DeviceAddress) -> Result<Vec<InstalledApp>, TransportError> {
        let xml = self.get_text(device, "/query/apps").await?;
        Ok(parse_apps(&xml))
    }

    pub async fn media_player(
        &self,
        device: &DeviceAddress,
    ) -> Result<Option<MediaPlayer>, TransportError> {
        let xml = self.get_text(device, "/query/media-player").await?;
        Ok(parse_media_player(&xml))
    }
}

impl DeviceTransport for RokuHttpClient {
    async fn send_key_press(&self, device: &DeviceAddress, key: &str) -> Result<(), TransportError> {
        self.post(device, &keypress_endpoint(key)).await
    }

    async fn launch_app(
        &self,
        device: &DeviceAddress,
        app_id: &str,
        params: &str,
    ) -> Result<(), TransportError> {
        self.post(device, &launch_endpoint(app_id, params)).await
    }
}
