// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: no model math, no printing, no
// direct file access. Each use case wires the data, ml and infra
// layers together for one command.

// The synthetic training workflow
pub mod train_use_case;

// Network inspection (parameter count, feature shapes)
pub mod summary_use_case;
