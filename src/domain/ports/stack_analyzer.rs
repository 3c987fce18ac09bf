use async_trait::async_trait;
use std::path::Path;

use crate::domain::errors::DomainResult;
use crate::domain::models::StackInfo;

/// Inspects a working copy and decides how to test it.
#[async_trait]
pub trait StackAnalyzer: Send + Sync {
    async fn analyze(&self, path: &Path) -> DomainResult<StackInfo>;
}
