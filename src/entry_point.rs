use std::{
    collections::HashMap,
    fmt::Display,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use poise::serenity_prelude::{
    self as serenity, ButtonStyle, ChannelId, Color, CreateEmbed, CreateMessage, MessageId, UserId,
};

use crate::{
    Error,
    form::FormSubmission,
    platform::{LatestMessage, Platform},
};

/// Custom id of the pinned button. Discord keeps it on the message across
/// restarts, so it must never change.
pub const ENTRY_BUTTON_ID: &str = "course_modal_button";
const RETRY_BUTTON_PREFIX: &str = "course_retry:";

/// Which handler a button press belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentRoute {
    /// The stable entry button: no state, works across restarts.
    Entry,
    /// A retry button: its state lives only in this process.
    Retry,
    Unknown,
}

pub fn route(custom_id: &str) -> ComponentRoute {
    if custom_id == ENTRY_BUTTON_ID {
        ComponentRoute::Entry
    } else if custom_id.starts_with(RETRY_BUTTON_PREFIX) {
        ComponentRoute::Retry
    } else {
        ComponentRoute::Unknown
    }
}

/// State of the designated channel as seen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    NoEntryMessage,
    EntryMessagePresent(MessageId),
}

impl EntryState {
    pub fn observe(latest: Option<LatestMessage>, bot: UserId) -> Self {
        match latest {
            Some(message) if message.author == bot => EntryState::EntryMessagePresent(message.id),
            _ => EntryState::NoEntryMessage,
        }
    }
}

pub fn entry_message() -> CreateMessage {
    CreateMessage::new()
        .embed(
            CreateEmbed::new()
                .title("강좌 신청하기")
                .description("강좌 신청을 하려면 아래 버튼을 눌러주세요.")
                .color(Color::BLUE),
        )
        .components(vec![serenity::CreateActionRow::Buttons(vec![
            serenity::CreateButton::new(ENTRY_BUTTON_ID)
                .label("강좌 신청하기")
                .style(ButtonStyle::Primary),
        ])])
}

/// Makes sure the designated channel ends with exactly one entry message.
///
/// When our own message is already the newest one it is kept, and its button
/// keeps working because [`ENTRY_BUTTON_ID`] is routed unconditionally.
/// Otherwise a fresh entry message is posted. Returns the entry message id.
pub async fn reconcile<P: Platform>(
    platform: &P,
    channel: ChannelId,
    bot: UserId,
) -> Result<MessageId, Error> {
    let latest = platform.latest_message(channel).await?;

    match EntryState::observe(latest, bot) {
        EntryState::EntryMessagePresent(message) => {
            log::info!("Reusing entry message {} in channel {}", message, channel);
            Ok(message)
        }
        EntryState::NoEntryMessage => {
            let message = platform.post_message(channel, entry_message()).await?;
            log::info!("Posted entry message {} in channel {}", message, channel);
            Ok(message)
        }
    }
}

pub fn retry_button(custom_id: impl Into<String>) -> serenity::CreateActionRow {
    serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new(custom_id)
            .label("다시 신청하기")
            .style(ButtonStyle::Primary),
    ])
}

/// Submissions waiting behind a retry button.
///
/// An entry stays usable until its form is submitted again or it expires, so
/// closing the pre-filled form does not lose the values. Entries are lost on
/// restart; a press on a retry button from a previous process finds nothing.
#[derive(Debug, Default)]
pub struct RetryRegistry {
    pending: Mutex<HashMap<String, PendingRetry>>,
}

#[derive(Debug)]
struct PendingRetry {
    submission: FormSubmission,
    expires_at: Instant,
}

impl RetryRegistry {
    /// Stores `submission` for `ttl` and returns the custom id for its retry
    /// button. Expired entries are dropped on the way.
    pub fn register(
        &self,
        token: impl Display,
        submission: FormSubmission,
        ttl: Duration,
    ) -> String {
        let custom_id = format!("{RETRY_BUTTON_PREFIX}{token}");
        let now = Instant::now();

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|_, retry| retry.expires_at > now);
        pending.insert(
            custom_id.clone(),
            PendingRetry {
                submission,
                expires_at: now + ttl,
            },
        );
        custom_id
    }

    /// The submission behind `custom_id`, left in place.
    pub fn get(&self, custom_id: &str) -> Option<FormSubmission> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(custom_id)
            .filter(|retry| retry.expires_at > Instant::now())
            .map(|retry| retry.submission.clone())
    }

    /// Forgets `custom_id` once its form has been submitted.
    pub fn remove(&self, custom_id: &str) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(custom_id);
    }
}
