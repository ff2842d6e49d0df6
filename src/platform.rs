use std::future::Future;

use poise::serenity_prelude::{
    ChannelId, ChannelType, CreateChannel, CreateMessage, GetMessages, GuildId, Http, MessageId,
    PermissionOverwrite, UserId,
};

use crate::Error;

/// The parts of a guild channel the provisioning workflow looks at.
#[derive(Debug, Clone)]
pub struct ChannelSummary {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelType,
    pub position: u16,
    pub overwrites: Vec<PermissionOverwrite>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestMessage {
    pub id: MessageId,
    pub author: UserId,
}

/// Everything needed to create a course channel in one request.
#[derive(Debug, Clone)]
pub struct NewChannel {
    pub name: String,
    pub parent: ChannelId,
    pub topic: String,
    pub overwrites: Vec<PermissionOverwrite>,
}

/// Outbound calls made against the chat platform.
///
/// Every method is a suspension point; nothing in between them awaits.
pub trait Platform: Sync {
    /// Most recent message of a channel, if any (history with limit 1).
    fn latest_message(
        &self,
        channel: ChannelId,
    ) -> impl Future<Output = Result<Option<LatestMessage>, Error>> + Send;

    fn post_message(
        &self,
        channel: ChannelId,
        message: CreateMessage,
    ) -> impl Future<Output = Result<MessageId, Error>> + Send;

    fn post_text(
        &self,
        channel: ChannelId,
        content: String,
    ) -> impl Future<Output = Result<MessageId, Error>> + Send;

    /// All channels of the guild, categories included.
    fn list_channels(
        &self,
        guild: GuildId,
    ) -> impl Future<Output = Result<Vec<ChannelSummary>, Error>> + Send;

    fn create_text_channel(
        &self,
        guild: GuildId,
        channel: NewChannel,
    ) -> impl Future<Output = Result<ChannelId, Error>> + Send;
}

/// [`Platform`] backed by serenity's HTTP client.
#[derive(Clone, Copy)]
pub struct HttpPlatform<'a> {
    http: &'a Http,
}

impl<'a> HttpPlatform<'a> {
    pub fn new(http: &'a Http) -> Self {
        Self { http }
    }
}

impl Platform for HttpPlatform<'_> {
    async fn latest_message(&self, channel: ChannelId) -> Result<Option<LatestMessage>, Error> {
        let messages = channel
            .messages(self.http, GetMessages::new().limit(1))
            .await?;

        Ok(messages.into_iter().next().map(|message| LatestMessage {
            id: message.id,
            author: message.author.id,
        }))
    }

    async fn post_message(
        &self,
        channel: ChannelId,
        message: CreateMessage,
    ) -> Result<MessageId, Error> {
        let sent = channel.send_message(self.http, message).await?;
        Ok(sent.id)
    }

    async fn post_text(&self, channel: ChannelId, content: String) -> Result<MessageId, Error> {
        let sent = channel.say(self.http, content).await?;
        Ok(sent.id)
    }

    async fn list_channels(&self, guild: GuildId) -> Result<Vec<ChannelSummary>, Error> {
        let channels = guild.channels(self.http).await?;

        Ok(channels
            .into_values()
            .map(|channel| ChannelSummary {
                id: channel.id,
                name: channel.name,
                kind: channel.kind,
                position: channel.position,
                overwrites: channel.permission_overwrites,
            })
            .collect())
    }

    async fn create_text_channel(
        &self,
        guild: GuildId,
        channel: NewChannel,
    ) -> Result<ChannelId, Error> {
        let builder = CreateChannel::new(channel.name)
            .kind(ChannelType::Text)
            .category(channel.parent)
            .topic(channel.topic)
            .permissions(channel.overwrites);

        let created = guild.create_channel(self.http, builder).await?;
        Ok(created.id)
    }
}
