// ── Reactive state store ──
//
// Immutable snapshots, instruction-driven commits, and synchronous
// change notification.

mod apply;
mod instruction;
mod registry;
mod state_store;

pub use instruction::Instruction;
pub use registry::{StateHandler, SubscriptionRegistry};
pub use state_store::StateStore;
