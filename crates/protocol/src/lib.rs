//! Data-only types for the cortex MCP surface: JSON-RPC envelope, error
//! codes, and the request/response payloads for each exposed method. No
//! transport or framing logic lives here.

mod envelope;
mod error;
mod methods;

pub use envelope::{Request, Response};
pub use error::{ErrorCode, ProtocolError};
pub use methods::{
    ContextEvent, ContextUpdateParams, ContextUpdateResult, DiscoveredProject, ProjectStatus, SearchParams,
    SearchResult, SearchResultItem, SearchScope, SearchTemplateParams, SearchTemplateResult,
    WorkspaceDiscoverParams, WorkspaceDiscoverResult, WorkspaceIndexParams, WorkspaceIndexResult,
    WorkspaceLoadParams, WorkspaceLoadResult, WorkspaceSaveParams, WorkspaceSaveResult,
    WorkspaceStatusParams, WorkspaceStatusResult,
};
