mod cache;
mod context;
mod error;
mod pipeline;
mod query;
mod rank;
mod templates;

pub use cache::{fingerprint, CacheLayer, CachedPayload, InProcessRemoteCache, RemoteCache};
pub use context::{TimestampedEntry, UserContext};
pub use error::{Result, SearchError};
pub use pipeline::{QueryPipeline, SearchRequest};
pub use query::{Intent, ParsedQuery, QueryEntities};
pub use rank::{RankCandidate, RankedResult, TeamFrequencyTable};
pub use templates::{SearchTemplate, TemplateBackend, TemplateRegistry};
