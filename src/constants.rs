// -
// Local log artifacts

/// Per-host event stream files under the log directory
pub(crate) const EVENTS_FILE_PREFIX: &str = "events-";

/// Rendered per-node configuration artifacts under the log directory
pub(crate) const CONFIG_ARTIFACT_PREFIX: &str = "drbd.conf-";

/// Read-position marker files live in this subdirectory of the log directory
pub(crate) const POSITIONS_SUBDIR: &str = "pos";

// -
// Configuration rendering

/// One indentation level in rendered configuration blocks
pub(crate) const CONFIG_INDENT: &str = "     ";

// -
// Event matching

/// Patterns that fail any in-flight wait unless explicitly lifted
pub(crate) const DEFAULT_FORBIDDEN_PATTERNS: [&str; 4] = [
    r"connection:Timeout",
    r"connection:ProtocolError",
    r"disk:Failed",
    r"peer-disk:Failed",
];

/// Marker emitted by the device after its initial event dump
pub(crate) const INITIAL_EVENTS_MARKER: &str = r"exists -";
