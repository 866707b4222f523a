// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types shared by every other layer:
//   - NO Burn framework types
//   - NO file I/O
//
// A PairedScan is what the data layer turns into tensors and
// what any future volume reader would produce.

// Paired volumes with their regression targets
pub mod scan;

// Core abstractions (traits) that other layers implement
pub mod traits;
