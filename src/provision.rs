use std::{
    collections::HashSet,
    sync::{Mutex, PoisonError},
};

use poise::serenity_prelude::{
    ChannelId, GuildId, Mentionable, PermissionOverwrite, PermissionOverwriteType, Permissions,
    UserId,
};

use crate::{
    Error,
    category::CourseCategory,
    form::FormSubmission,
    platform::{NewChannel, Platform},
};

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("fallback category `{0}` does not exist")]
    MissingFallback(String),
    #[error("platform request failed: {0}")]
    Platform(#[from] Error),
}

/// What the requester may do in their own course channel.
pub fn instructor_permissions() -> Permissions {
    Permissions::VIEW_CHANNEL
        | Permissions::MANAGE_CHANNELS
        | Permissions::SEND_MESSAGES
        | Permissions::MANAGE_MESSAGES
        | Permissions::MANAGE_THREADS
        | Permissions::CREATE_PUBLIC_THREADS
        | Permissions::SEND_MESSAGES_IN_THREADS
        | Permissions::EMBED_LINKS
        | Permissions::ATTACH_FILES
}

/// The category's overwrites with the instructor's entry raised to
/// [`instructor_permissions`]. Other entries are carried over untouched.
pub fn course_overwrites(
    inherited: &[PermissionOverwrite],
    instructor: UserId,
) -> Vec<PermissionOverwrite> {
    let granted = instructor_permissions();
    let mut overwrites = Vec::with_capacity(inherited.len() + 1);
    let mut elevated = false;

    for overwrite in inherited {
        match overwrite.kind {
            PermissionOverwriteType::Member(user) if user == instructor => {
                overwrites.push(PermissionOverwrite {
                    allow: overwrite.allow | granted,
                    deny: overwrite.deny.difference(granted),
                    kind: overwrite.kind,
                });
                elevated = true;
            }
            _ => overwrites.push(overwrite.clone()),
        }
    }

    if !elevated {
        overwrites.push(PermissionOverwrite {
            allow: granted,
            deny: Permissions::empty(),
            kind: PermissionOverwriteType::Member(instructor),
        });
    }
    overwrites
}

/// Creates the course channel and introduces its instructor.
///
/// Not retried on failure: a second attempt could leave a duplicate channel
/// behind if the first one was created after all.
pub async fn create_course_channel<P: Platform>(
    platform: &P,
    guild: GuildId,
    instructor: UserId,
    submission: &FormSubmission,
    category: &CourseCategory,
) -> Result<ChannelId, ProvisionError> {
    let channel = platform
        .create_text_channel(
            guild,
            NewChannel {
                name: submission.course_name.clone(),
                parent: category.id,
                topic: submission.description.clone(),
                overwrites: course_overwrites(&category.overwrites, instructor),
            },
        )
        .await?;

    platform
        .post_text(channel, format!("선생님: {}\n", instructor.mention()))
        .await?;

    Ok(channel)
}

/// Course names currently being provisioned in this process.
#[derive(Debug, Default)]
pub struct NameReservations {
    held: Mutex<HashSet<String>>,
}

impl NameReservations {
    /// Holds `name` until the returned guard drops, or `None` if it is
    /// already held.
    pub fn reserve(&self, name: &str) -> Option<Reservation<'_>> {
        let key = normalize_name(name);
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(key.clone()) {
            return None;
        }
        Some(Reservation { table: self, key })
    }

}

pub struct Reservation<'a> {
    table: &'a NameReservations,
    key: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.table
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Text channel names as Discord stores them: lowercase, whitespace runs as `-`.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}
