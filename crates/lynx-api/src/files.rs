//! Static file helpers: path sanitizing, directory listings, MIME types and
//! the form echo page.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use lynx_plugin::api::toolkit::{parse_query, url_decode};

/// Characters escaped in listing links.
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

/// A request path resolved inside the web root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Filesystem path under the web root.
    pub fs_path: PathBuf,
    /// Normalized web path, `/` for the root itself.
    pub rel: String,
}

/// Maps a raw request target onto the web root.
///
/// The query is dropped, `+` and percent escapes are decoded, empty and `.`
/// segments are collapsed. Any `..` yields `None`.
pub fn sanitize(web_root: &Path, raw: &str) -> Option<Resolved> {
    let path = raw.split_once('?').map_or(raw, |(p, _)| p);
    let decoded = url_decode(path);
    if decoded.contains("..") {
        return None;
    }

    let segments: Vec<&str> = decoded
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();

    let mut fs_path = web_root.to_path_buf();
    fs_path.extend(&segments);

    Some(Resolved {
        fs_path,
        rel: format!("/{}", segments.join("/")),
    })
}

/// Renders an HTML listing of `dir`, linking each entry under `rel`.
pub fn directory_listing(dir: &Path, rel: &str) -> std::io::Result<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    let base = rel.trim_end_matches('/');
    let mut html = String::from("<html><body><h1>Directory listing</h1><ul>");
    for name in names {
        let href = format!("{base}/{}", utf8_percent_encode(&name, HREF));
        html.push_str(&format!(
            "<li><a href=\"{href}\">{}</a></li>",
            escape_html(&name)
        ));
    }
    html.push_str("</ul></body></html>");
    Ok(html)
}

/// MIME type guessed from the file extension.
pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// HTML page echoing a decoded form body.
pub fn form_echo(body: &[u8]) -> String {
    let fields = parse_query(&String::from_utf8_lossy(body));
    format!(
        "<html><body><pre>{}</pre></body></html>",
        escape_html(&render_fields(&fields))
    )
}

fn render_fields(fields: &BTreeMap<String, Vec<String>>) -> String {
    let entries: Vec<String> = fields
        .iter()
        .map(|(key, values)| {
            let values: Vec<String> = values.iter().map(|v| format!("'{v}'")).collect();
            format!("'{key}': [{}]", values.join(", "))
        })
        .collect();
    format!("{{{}}}", entries.join(", "))
}

/// Escapes text for HTML element content and attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
