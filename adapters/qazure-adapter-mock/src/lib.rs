//! In-memory Azure Quantum workspace
//!
//! Backs the `mock` deployment environment (`AZURE_QUANTUM_ENV=mock`): no
//! network calls are made and every job lives in process memory.
//!
//! # Workspaces
//!
//! | Workspace name | Providers |
//! |----------------|-----------|
//! | `WorkspaceNameWithMockProviders` | one `<provider>.mock` target per known provider, plus `contoso.qpu` |
//! | anything else | none |
//!
//! Jobs start `Waiting`, report `Executing` for
//! [`MockBehavior::polls_until_complete`] status queries, then settle on
//! [`MockBehavior::final_status`]. Succeeded jobs produce a uniform
//! two-outcome histogram.

mod workspace;

pub use workspace::{
    MOCK_PROVIDERS_WORKSPACE, MockBehavior, MockMachine, MockWorkspace, MockWorkspaceFactory,
    UNRECOGNIZED_TARGET, mock_providers,
};
