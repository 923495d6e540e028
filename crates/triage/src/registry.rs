//! Extension → handler lookup table.

use foldersort_config::HandlerKind;
use foldersort_handlers::Handler;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::instrument;

/// Two handlers claimed the same extension; `replacement` won.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    pub extension: String,
    pub previous: HandlerKind,
    pub replacement: HandlerKind,
}

/// Immutable after [`HandlerRegistry::register`] returns; share it with `Arc`.
pub struct HandlerRegistry {
    handlers: Vec<Arc<Handler>>,
    table: HashMap<String, usize>,
    conflicts: Vec<Conflict>,
}

impl HandlerRegistry {
    /// Register `handlers` in order, querying each for its extensions once.
    ///
    /// A later handler claiming an extension that is already mapped takes it
    /// over; the takeover is logged and kept in [`conflicts`](Self::conflicts).
    #[instrument(skip_all)]
    pub async fn register(handlers: impl IntoIterator<Item = Handler>) -> Self {
        let mut registry = Self { handlers: Vec::new(), table: HashMap::new(), conflicts: Vec::new() };
        for handler in handlers {
            let index = registry.handlers.len();
            let extensions = handler.supported_extensions().await;
            let kind = handler.kind();
            registry.handlers.push(Arc::new(handler));
            let mut claimed = 0_usize;
            for extension in extensions.iter().filter_map(|e| normalize(e)) {
                match registry.table.insert(extension.clone(), index) {
                    Some(previous) if previous != index => {
                        let previous = registry.handlers[previous].kind();
                        tracing::warn!(
                            extension = %extension,
                            previous = %previous,
                            replacement = %kind,
                            "Extension claimed by more than one handler; later registration wins"
                        );
                        registry.conflicts.push(Conflict { extension, previous, replacement: kind });
                    },
                    Some(_) => continue,
                    None => {},
                }
                claimed += 1;
            }
            tracing::info!(handler = %kind, extensions = claimed, "Handler registered");
        }
        registry
    }

    /// Handler for `extension`, ignoring case and a leading dot.
    pub fn lookup(&self, extension: &str) -> Option<&Arc<Handler>> {
        let extension = normalize(extension)?;
        self.table.get(&extension).map(|index| &self.handlers[*index])
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Target folders of every registered handler, including handlers that
    /// lost all their extensions to later registrations.
    pub fn target_dirs(&self) -> Vec<PathBuf> {
        self.handlers.iter().map(|h| h.target_dir().to_path_buf()).collect()
    }

    /// Mapped extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self.table.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }
}

fn normalize(extension: &str) -> Option<String> {
    let extension = extension.trim().trim_start_matches('.');
    (!extension.is_empty()).then(|| extension.to_lowercase())
}
