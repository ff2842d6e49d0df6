//! In-memory guild used by the unit tests.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use poise::serenity_prelude::{
    ChannelId, ChannelType, CreateMessage, GuildId, MessageId, PermissionOverwrite,
    PermissionOverwriteType, Permissions, RoleId, UserId,
};

use crate::{
    Error,
    platform::{ChannelSummary, LatestMessage, NewChannel, Platform},
};

pub const GUILD: u64 = 900;
/// The @everyone role shares the guild's id.
pub const EVERYONE: u64 = GUILD;
pub const BOT: u64 = 777;

pub fn category(id: u64, name: &str, overwrites: Vec<PermissionOverwrite>) -> ChannelSummary {
    ChannelSummary {
        id: ChannelId::new(id),
        name: name.to_string(),
        kind: ChannelType::Category,
        position: id as u16,
        overwrites,
    }
}

pub fn text_channel(id: u64, name: &str) -> ChannelSummary {
    ChannelSummary {
        id: ChannelId::new(id),
        name: name.to_string(),
        kind: ChannelType::Text,
        position: id as u16,
        overwrites: vec![],
    }
}

pub fn category_overwrite(allow: Permissions) -> PermissionOverwrite {
    PermissionOverwrite {
        allow,
        deny: Permissions::empty(),
        kind: PermissionOverwriteType::Role(RoleId::new(EVERYONE)),
    }
}

pub fn member_overwrite(user: UserId, allow: Permissions, deny: Permissions) -> PermissionOverwrite {
    PermissionOverwrite {
        allow,
        deny,
        kind: PermissionOverwriteType::Member(user),
    }
}

#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: MessageId,
    pub author: UserId,
    /// `None` for embed/component messages.
    pub text: Option<String>,
}

#[derive(Debug, Default)]
struct GuildState {
    channels: Vec<ChannelSummary>,
    messages: HashMap<ChannelId, Vec<StoredMessage>>,
    created: Vec<NewChannel>,
    create_attempts: usize,
    reject_creation: bool,
    next_id: u64,
}

#[derive(Debug, Default)]
pub struct FakePlatform {
    state: Mutex<GuildState>,
}

impl FakePlatform {
    pub fn with_channels(channels: Vec<ChannelSummary>) -> Self {
        let platform = Self::default();
        platform.state().channels = channels;
        platform
    }

    fn state(&self) -> MutexGuard<'_, GuildState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reject_channel_creation(&self) {
        self.state().reject_creation = true;
    }

    /// Simulates a message written by someone other than the bot.
    pub fn add_message(&self, channel: ChannelId, author: UserId, text: &str) -> MessageId {
        let mut state = self.state();
        let id = next_message_id(&mut state);
        state.messages.entry(channel).or_default().push(StoredMessage {
            id,
            author,
            text: Some(text.to_string()),
        });
        id
    }

    pub fn messages_in(&self, channel: ChannelId) -> Vec<StoredMessage> {
        self.state().messages.get(&channel).cloned().unwrap_or_default()
    }

    pub fn texts_in(&self, channel: ChannelId) -> Vec<String> {
        self.messages_in(channel)
            .into_iter()
            .filter_map(|message| message.text)
            .collect()
    }

    pub fn created(&self) -> Vec<NewChannel> {
        self.state().created.clone()
    }

    pub fn create_attempts(&self) -> usize {
        self.state().create_attempts
    }

    fn push(&self, channel: ChannelId, text: Option<String>) -> MessageId {
        let mut state = self.state();
        let id = next_message_id(&mut state);
        state.messages.entry(channel).or_default().push(StoredMessage {
            id,
            author: UserId::new(BOT),
            text,
        });
        id
    }
}

fn next_message_id(state: &mut GuildState) -> MessageId {
    state.next_id += 1;
    MessageId::new(100_000 + state.next_id)
}

impl Platform for FakePlatform {
    async fn latest_message(&self, channel: ChannelId) -> Result<Option<LatestMessage>, Error> {
        Ok(self
            .state()
            .messages
            .get(&channel)
            .and_then(|messages| messages.last())
            .map(|message| LatestMessage {
                id: message.id,
                author: message.author,
            }))
    }

    async fn post_message(&self, channel: ChannelId, _: CreateMessage) -> Result<MessageId, Error> {
        Ok(self.push(channel, None))
    }

    async fn post_text(&self, channel: ChannelId, content: String) -> Result<MessageId, Error> {
        Ok(self.push(channel, Some(content)))
    }

    async fn list_channels(&self, guild: GuildId) -> Result<Vec<ChannelSummary>, Error> {
        assert_eq!(guild, GuildId::new(GUILD));
        Ok(self.state().channels.clone())
    }

    async fn create_text_channel(
        &self,
        guild: GuildId,
        channel: NewChannel,
    ) -> Result<ChannelId, Error> {
        assert_eq!(guild, GuildId::new(GUILD));
        let mut state = self.state();
        state.create_attempts += 1;
        if state.reject_creation {
            return Err("Missing Permissions".into());
        }

        let position = state.channels.len();
        let id = ChannelId::new(5_000 + position as u64);
        state.channels.push(ChannelSummary {
            id,
            name: channel.name.clone(),
            kind: ChannelType::Text,
            position: position as u16,
            overwrites: channel.overwrites.clone(),
        });
        state.created.push(channel);
        Ok(id)
    }
}
