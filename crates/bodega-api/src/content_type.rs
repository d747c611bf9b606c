//! Content-type inference from file extensions.

use std::path::Path;

/// Infer a response content type from the file extension. Unknown
/// extensions are served as opaque bytes.
pub fn from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("txt" | "log" | "md") => "text/plain; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz" | "tgz") => "application/gzip",
        Some("tar") => "application/x-tar",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_extensions() {
        assert_eq!(from_path(Path::new("a/b/index.html")), "text/html; charset=utf-8");
        assert_eq!(from_path(Path::new("report.TXT")), "text/plain; charset=utf-8");
        assert_eq!(from_path(Path::new("pkg.tar")), "application/x-tar");
        assert_eq!(from_path(Path::new("pkg.tgz")), "application/gzip");
    }

    #[test]
    fn unknown_and_missing_extensions_are_octet_stream() {
        assert_eq!(from_path(Path::new("file.bin")), "application/octet-stream");
        assert_eq!(from_path(Path::new("Makefile")), "application/octet-stream");
    }
}
