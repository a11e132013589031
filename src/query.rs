use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

const LOCAL_PREFIX: &str = "localtrack:";
const SEARCH_PREFIXES: [&str; 3] = ["ytsearch:", "ytmsearch:", "scsearch:"];

/// Consulta normalizada: la forma canónica que usan la caché y el proveedor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    pub canonical: String,
    pub is_local: bool,
    pub valid: bool,
    pub local_path: Option<PathBuf>,
}

impl NormalizedQuery {
    pub fn invalid(raw: &str) -> Self {
        Self {
            canonical: raw.trim().to_string(),
            is_local: false,
            valid: false,
            local_path: None,
        }
    }

    pub fn remote(canonical: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
            is_local: false,
            valid: true,
            local_path: None,
        }
    }

    pub fn local(path: PathBuf) -> Self {
        Self {
            canonical: path.display().to_string(),
            is_local: true,
            valid: true,
            local_path: Some(path),
        }
    }

    pub fn local_path_exists(&self) -> bool {
        self.local_path.as_deref().is_some_and(Path::exists)
    }
}

impl fmt::Display for NormalizedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Convierte una entrada cruda en una consulta canónica.
pub trait QueryNormalizer: Send + Sync {
    fn normalize(&self, raw: &str, local_root: &Path) -> NormalizedQuery;
}

/// Los tracks locales son `localtrack:<ruta>` o rutas absolutas bajo la raíz local;
/// las URLs http(s) y URIs de Spotify pasan tal cual; el texto suelto se busca en YouTube.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardNormalizer;

impl QueryNormalizer for StandardNormalizer {
    fn normalize(&self, raw: &str, local_root: &Path) -> NormalizedQuery {
        let raw = raw.trim();
        if raw.is_empty() {
            return NormalizedQuery::invalid(raw);
        }

        if let Some(rest) = raw.strip_prefix(LOCAL_PREFIX) {
            let rest = Path::new(rest.trim());
            if rest.as_os_str().is_empty() {
                return NormalizedQuery::invalid(raw);
            }
            let path = if rest.is_absolute() {
                rest.to_path_buf()
            } else {
                local_root.join(rest)
            };
            return NormalizedQuery::local(path);
        }

        let as_path = Path::new(raw);
        if as_path.is_absolute() && as_path.starts_with(local_root) {
            return NormalizedQuery::local(as_path.to_path_buf());
        }

        if SEARCH_PREFIXES.iter().any(|prefix| raw.starts_with(prefix)) {
            return NormalizedQuery::remote(raw);
        }

        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => NormalizedQuery::remote(url.to_string()),
            Ok(url) if url.scheme() == "spotify" => NormalizedQuery::remote(raw),
            Ok(url) if url.cannot_be_a_base() && !raw.contains(' ') => NormalizedQuery::invalid(raw),
            _ => NormalizedQuery::remote(format!("ytsearch:{}", raw)),
        }
    }
}
