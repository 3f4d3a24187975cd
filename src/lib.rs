// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Library root for the merged report grid: configuration normalization, fetch scheduling, view projection, diagnostics
// role: module/aggregation
// outputs: Public modules consumed by the binary and integration tests
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

pub mod cli;
pub mod diagnostics;
pub mod ext;
pub mod host;
pub mod model;
pub mod normalize;
pub mod runtime;
pub mod scheduler;
pub mod service;
pub mod util;
pub mod view;
