pub mod conversations;
pub mod engagement;
pub mod health;
pub mod keys;
pub mod messages;
pub mod sessions;

use serde::Deserialize;

use crate::pagination::Page;

/// Offset pagination for list endpoints that have no query of their own.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams, utoipa::ToSchema)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(self.limit, self.offset)
    }
}
