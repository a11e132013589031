use async_trait::async_trait;
use std::sync::Arc;

use crate::config::SettingsProvider;
use crate::context::GuildId;

/// Política de contenido permitido por servidor.
#[async_trait]
pub trait ContentFilter: Send + Sync {
    async fn is_allowed(&self, guild_id: GuildId, text: &str) -> bool;
}

/// Listas de palabras del servidor, sin distinguir mayúsculas. Si hay
/// whitelist, manda ella: el texto debe contener alguna de sus palabras.
pub struct KeywordFilter {
    settings: Arc<dyn SettingsProvider>,
}

impl KeywordFilter {
    pub fn new(settings: Arc<dyn SettingsProvider>) -> Self {
        Self { settings }
    }
}

pub(crate) fn passes(text: &str, whitelist: &[String], blacklist: &[String]) -> bool {
    let text = text.to_lowercase();
    let mentions = |word: &String| {
        let word = word.trim().to_lowercase();
        !word.is_empty() && text.contains(&word)
    };
    if !whitelist.is_empty() {
        return whitelist.iter().any(mentions);
    }
    !blacklist.iter().any(mentions)
}

#[async_trait]
impl ContentFilter for KeywordFilter {
    async fn is_allowed(&self, guild_id: GuildId, text: &str) -> bool {
        let guild = self.settings.guild(guild_id).await;
        passes(text, &guild.whitelist, &guild.blacklist)
    }
}

/// Permite todo.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

#[async_trait]
impl ContentFilter for AllowAll {
    async fn is_allowed(&self, _guild_id: GuildId, _text: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ResolverSettings, SharedSettings};
    use crate::storage::{GuildSettings, GuildSettingsStore};

    #[test]
    fn blacklist_blocks_matching_text() {
        let blacklist = vec!["Nightcore".to_string()];
        assert!(!passes("Song (NIGHTCORE remix) Artist", &[], &blacklist));
        assert!(passes("Song Artist", &[], &blacklist));
    }

    #[test]
    fn whitelist_takes_precedence() {
        let whitelist = vec!["jazz".to_string()];
        let blacklist = vec!["live".to_string()];
        assert!(passes("Jazz live at the club", &whitelist, &blacklist));
        assert!(!passes("Rock anthem", &whitelist, &blacklist));
    }

    #[tokio::test]
    async fn reads_the_guild_lists() {
        let guilds = GuildSettingsStore::in_memory();
        let mut settings = GuildSettings::new(GuildId(1));
        settings.blacklist = vec!["banned".into()];
        guilds.update(settings).await.unwrap();
        let filter = KeywordFilter::new(Arc::new(SharedSettings::new(ResolverSettings::default(), guilds)));

        assert!(!filter.is_allowed(GuildId(1), "a banned song").await);
        assert!(filter.is_allowed(GuildId(2), "a banned song").await);
    }
}
