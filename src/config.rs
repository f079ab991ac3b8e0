// SPDX-License-Identifier: CC0-1.0

//! Construction-time wallet configuration.

use std::path::PathBuf;

use url::Url;

use crate::hdkey::Category;

/// Explicit construction parameters for a [`crate::Wallet`].
///
/// Replaces the source's global server flag (§9 Design Notes): the server
/// URL, wallet base path, and change-category workaround are all supplied
/// here rather than read from process-global state.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct WalletConfig {
    /// Base path `P`; the wallet owns the sibling files `P.db` and `P.bak`.
    pub base_path: PathBuf,
    /// Base URL of the remote mint server, e.g. `https://mint.example/`.
    pub server: Url,
    /// Category used when deriving change secrets.
    ///
    /// Defaults to [`Category::Change`]. Set to [`Category::Mining`] to
    /// reproduce the external-miner workaround the source hardwired (§9).
    pub change_category: Category,
}

impl WalletConfig {
    /// Builds a config with `change_category` defaulted to
    /// [`Category::Change`].
    pub fn new(base_path: PathBuf, server: Url) -> Self {
        WalletConfig { base_path, server, change_category: Category::Change }
    }

    /// Overrides the change category, e.g. to `Category::Mining`.
    pub fn with_change_category(mut self, category: Category) -> Self {
        self.change_category = category;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_change_category_is_change() {
        let cfg = WalletConfig::new(PathBuf::from("/tmp/wallet"), Url::parse("https://mint.example").unwrap());
        assert_eq!(cfg.change_category, Category::Change);
    }

    #[test]
    fn change_category_can_be_overridden() {
        let cfg = WalletConfig::new(PathBuf::from("/tmp/wallet"), Url::parse("https://mint.example").unwrap())
            .with_change_category(Category::Mining);
        assert_eq!(cfg.change_category, Category::Mining);
    }
}
