/// The fixed set of tables the cortex engine persists project and query
/// state into. Each variant names its primary key column so the generic
/// `get`/`put`/`delete` contract can address any of them uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Projects,
    IndexingState,
    UserContext,
    Templates,
    CachedResults,
}

impl Table {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Projects => "projects",
            Self::IndexingState => "indexing_state",
            Self::UserContext => "user_context",
            Self::Templates => "templates",
            Self::CachedResults => "cached_results",
        }
    }

    pub const fn key_column(self) -> &'static str {
        match self {
            Self::Projects => "id",
            Self::IndexingState => "project_id",
            Self::UserContext => "user_id",
            Self::Templates => "name",
            Self::CachedResults => "fingerprint",
        }
    }
}
