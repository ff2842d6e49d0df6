use std::time::Duration;

use poise::serenity_prelude::{
    self as serenity, ChannelId, ComponentInteraction, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, GuildId, Interaction,
    Mentionable, ModalInteraction, UserId,
};

use crate::{
    Data, Error,
    category::CategoryIndex,
    config::CourseSettings,
    entry_point::{self, ComponentRoute},
    form::{FormSpec, FormSubmission},
    logging,
    platform::{HttpPlatform, Platform},
    provision::{self, NameReservations, ProvisionError},
    validation::{self, Rejection},
};

const COURSE_FAILED: &str = "강좌를 만들던 도중 에러가 발생하였습니다. 다시 시도해 주세요.";
const RETRY_EXPIRED: &str = "신청 정보가 만료되었습니다. 고정된 신청 버튼을 다시 눌러주세요.";

/// Result of one submitted course form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created(ChannelId),
    Rejected(Rejection),
}

/// Validates a submission against the live guild and provisions the channel.
///
/// The character and agreement rules run first. Only a submission that
/// passes them reserves its name, and the reservation is taken before the
/// guild is listed, so a concurrent submission for the same name in this
/// process either shows up in the listing or finds the reservation taken.
pub async fn process_submission<P: Platform>(
    platform: &P,
    settings: &CourseSettings,
    reservations: &NameReservations,
    guild: GuildId,
    requester: UserId,
    submission: &FormSubmission,
) -> Result<Outcome, ProvisionError> {
    if let Err(rejection) = validation::check_form(submission, &settings.consent_phrase) {
        return Ok(Outcome::Rejected(rejection));
    }
    let Some(_reservation) = reservations.reserve(&submission.course_name) else {
        return Ok(Outcome::Rejected(Rejection::DuplicateName));
    };

    let channels = platform.list_channels(guild).await?;
    if let Err(rejection) = validation::check_unique(submission, &channels) {
        return Ok(Outcome::Rejected(rejection));
    }

    let categories = CategoryIndex::build(&channels, &settings.category_suffix);
    let category = categories.resolve(&submission.category, &settings.fallback_category)?;

    let channel =
        provision::create_course_channel(platform, guild, requester, submission, category).await?;
    Ok(Outcome::Created(channel))
}

/// Entry point for every `InteractionCreate` event.
pub async fn handle_interaction(
    ctx: &serenity::Context,
    data: &Data,
    interaction: &Interaction,
) -> Result<(), Error> {
    let Some(component) = interaction.as_message_component() else {
        return Ok(());
    };
    let custom_id = component.data.custom_id.as_str();

    match entry_point::route(custom_id) {
        ComponentRoute::Entry => present_form(ctx, data, component, None).await,
        ComponentRoute::Retry => match data.retries.get(custom_id) {
            Some(prior) => present_form(ctx, data, component, Some((custom_id, prior))).await,
            None => {
                component
                    .create_response(
                        ctx,
                        CreateInteractionResponse::Message(
                            CreateInteractionResponseMessage::new()
                                .content(RETRY_EXPIRED)
                                .ephemeral(true),
                        ),
                    )
                    .await?;
                Ok(())
            }
        },
        ComponentRoute::Unknown => Ok(()),
    }
}

/// Shows the form, pre-filled when `retry` carries an earlier attempt. The
/// retry entry is only dropped once the form comes back submitted.
async fn present_form(
    ctx: &serenity::Context,
    data: &Data,
    component: &ComponentInteraction,
    retry: Option<(&str, FormSubmission)>,
) -> Result<(), Error> {
    let Some(guild) = component.guild_id else {
        return Ok(());
    };
    let settings = data.config.read().await.course.clone();
    let platform = HttpPlatform::new(&ctx.http);

    let channels = platform.list_channels(guild).await?;
    let categories = CategoryIndex::build(&channels, &settings.category_suffix);
    if categories.is_empty() {
        log::warn!(
            "Guild {} has no categories ending in `{}`",
            guild,
            settings.category_suffix
        );
    } else if categories.get(&settings.fallback_category).is_none() {
        log::warn!(
            "Guild {} has no `{} {}` category; course creation will fail",
            guild,
            settings.fallback_category,
            settings.category_suffix
        );
    }
    log::debug!("Offering {} categories in guild {}", categories.len(), guild);

    let modal_id = component.id.to_string();
    let prior = retry.as_ref().map(|(_, prior)| prior);
    let form = FormSpec::new(prior, &categories, &settings.consent_phrase);
    component
        .create_response(ctx, CreateInteractionResponse::Modal(form.to_modal(&modal_id)))
        .await?;

    let filter_id = modal_id.clone();
    let response = serenity::collector::ModalInteractionCollector::new(&ctx.shard)
        .filter(move |modal_interaction| modal_interaction.data.custom_id == filter_id)
        .timeout(Duration::from_secs(settings.modal_timeout_secs))
        .await;

    let Some(modal) = response else {
        log::debug!("Course form {} was not submitted in time", modal_id);
        return Ok(());
    };

    if let Some((retry_id, _)) = retry {
        data.retries.remove(retry_id);
    }
    let submission = FormSubmission::from_modal(&modal.data);
    handle_submission(ctx, data, &settings, &modal, guild, submission).await
}

async fn handle_submission(
    ctx: &serenity::Context,
    data: &Data,
    settings: &CourseSettings,
    modal: &ModalInteraction,
    guild: GuildId,
    submission: FormSubmission,
) -> Result<(), Error> {
    // Creating the channel takes several requests; don't race the 3s window.
    modal.defer_ephemeral(ctx).await?;

    let platform = HttpPlatform::new(&ctx.http);
    let outcome = process_submission(
        &platform,
        settings,
        &data.reservations,
        guild,
        modal.user.id,
        &submission,
    )
    .await;

    let retry_ttl = Duration::from_secs(settings.retry_timeout_secs);
    let reply = match outcome {
        Ok(Outcome::Created(channel)) => {
            logging::log_course_created(&modal.user, channel, &submission);
            CreateInteractionResponseFollowup::new().content(format!(
                "강좌가 만들어졌습니다! 좋은 강의 부탁드려요!\n{}",
                channel.mention()
            ))
        }
        Ok(Outcome::Rejected(rejection)) => {
            log::info!("Course form from {} rejected: {:?}", modal.user.id, rejection);
            let retry = data.retries.register(modal.id, submission, retry_ttl);
            CreateInteractionResponseFollowup::new()
                .content(rejection.to_string())
                .components(vec![entry_point::retry_button(retry)])
        }
        Err(error) => {
            logging::log_course_failed(&modal.user, &submission, &error);
            let retry = data.retries.register(modal.id, submission, retry_ttl);
            CreateInteractionResponseFollowup::new()
                .content(COURSE_FAILED)
                .components(vec![entry_point::retry_button(retry)])
        }
    };

    modal.create_followup(ctx, reply.ephemeral(true)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entry_point::RetryRegistry,
        form::FieldKey,
        provision::instructor_permissions,
        testing::{EVERYONE, FakePlatform, GUILD, category, category_overwrite, text_channel},
    };
    use crate::platform::{ChannelSummary, LatestMessage, NewChannel};
    use poise::serenity_prelude::{
        CreateMessage, MessageId, PermissionOverwriteType, Permissions, RoleId,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    fn requester() -> UserId {
        UserId::new(1001)
    }

    fn guild() -> GuildId {
        GuildId::new(GUILD)
    }

    fn platform() -> FakePlatform {
        FakePlatform::with_channels(vec![
            category(10, "프로그래밍 강좌", vec![]),
            category(20, "기타 강좌", vec![category_overwrite(Permissions::VIEW_CHANNEL)]),
            text_channel(21, "테스트"),
        ])
    }

    fn submission(name: &str, category: &str, agreement: &str) -> FormSubmission {
        FormSubmission {
            course_name: name.to_string(),
            category: category.to_string(),
            description: "매주 수요일 저녁".to_string(),
            agreement: agreement.to_string(),
        }
    }

    async fn submit(
        platform: &FakePlatform,
        reservations: &NameReservations,
        submission: &FormSubmission,
    ) -> Result<Outcome, ProvisionError> {
        process_submission(
            platform,
            &CourseSettings::default(),
            reservations,
            guild(),
            requester(),
            submission,
        )
        .await
    }

    #[tokio::test]
    async fn creates_course_in_requested_category() {
        let platform = platform();
        let outcome = submit(
            &platform,
            &NameReservations::default(),
            &submission("러스트", "프로그래밍", "동의합니다"),
        )
        .await
        .unwrap();

        let Outcome::Created(channel) = outcome else {
            panic!("expected a channel, got {outcome:?}");
        };
        let created = platform.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].parent, ChannelId::new(10));
        assert_eq!(created[0].topic, "매주 수요일 저녁");
        assert_eq!(platform.texts_in(channel), vec!["선생님: <@1001>\n".to_string()]);
    }

    #[tokio::test]
    async fn unknown_category_uses_fallback() {
        let platform = platform();
        let outcome = submit(
            &platform,
            &NameReservations::default(),
            &submission("러스트", "없는카테고리", "동의합니다"),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, Outcome::Created(_)));
        assert_eq!(platform.created()[0].parent, ChannelId::new(20));
    }

    #[tokio::test]
    async fn duplicate_name_creates_nothing() {
        let platform = platform();
        let outcome = submit(
            &platform,
            &NameReservations::default(),
            &submission("테스트", "기타", "동의합니다"),
        )
        .await
        .unwrap();

        assert_eq!(outcome, Outcome::Rejected(Rejection::DuplicateName));
        assert_eq!(platform.create_attempts(), 0);
    }

    #[tokio::test]
    async fn first_failing_rule_is_reported() {
        let platform = platform();
        let outcome = submit(
            &platform,
            &NameReservations::default(),
            &submission("C++ 입문", "기타", "싫어요"),
        )
        .await
        .unwrap();

        assert_eq!(outcome, Outcome::Rejected(Rejection::InvalidCharacters));
        assert_eq!(platform.create_attempts(), 0);
    }

    #[tokio::test]
    async fn permission_map_inherits_category_and_elevates_requester() {
        let platform = platform();
        submit(
            &platform,
            &NameReservations::default(),
            &submission("러스트", "기타", "동의합니다"),
        )
        .await
        .unwrap();

        let overwrites = &platform.created()[0].overwrites;
        assert_eq!(overwrites.len(), 2);
        assert!(matches!(
            overwrites[0].kind,
            PermissionOverwriteType::Role(role) if role == RoleId::new(EVERYONE)
        ));
        assert_eq!(overwrites[0].allow, Permissions::VIEW_CHANNEL);
        assert!(matches!(
            overwrites[1].kind,
            PermissionOverwriteType::Member(user) if user == requester()
        ));
        assert_eq!(overwrites[1].allow, instructor_permissions());
    }

    #[tokio::test]
    async fn in_flight_name_is_rejected_then_released() {
        let platform = platform();
        let reservations = NameReservations::default();
        let request = submission("러스트", "기타", "동의합니다");

        let held = reservations.reserve("러스트").unwrap();
        let outcome = submit(&platform, &reservations, &request).await.unwrap();
        assert_eq!(outcome, Outcome::Rejected(Rejection::DuplicateName));
        assert_eq!(platform.create_attempts(), 0);

        drop(held);
        let outcome = submit(&platform, &reservations, &request).await.unwrap();
        assert!(matches!(outcome, Outcome::Created(_)));
    }

    #[tokio::test]
    async fn invalid_name_wins_over_reservation() {
        let platform = platform();
        let reservations = NameReservations::default();
        let _held = reservations.reserve("C++").unwrap();

        let outcome = submit(&platform, &reservations, &submission("C++", "기타", "동의합니다"))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Rejected(Rejection::InvalidCharacters));
    }

    #[tokio::test]
    async fn missing_fallback_fails_at_creation_time() {
        let platform = FakePlatform::with_channels(vec![category(10, "프로그래밍 강좌", vec![])]);
        let reservations = NameReservations::default();

        let err = submit(&platform, &reservations, &submission("러스트", "음악", "동의합니다"))
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::MissingFallback(_)));
        assert_eq!(platform.create_attempts(), 0);
        assert!(reservations.reserve("러스트").is_some());
    }

    #[tokio::test]
    async fn rejected_creation_is_reported_once() {
        let platform = platform();
        platform.reject_channel_creation();

        let err = submit(
            &platform,
            &NameReservations::default(),
            &submission("러스트", "기타", "동의합니다"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ProvisionError::Platform(_)));
        assert_eq!(platform.create_attempts(), 1);
    }

    #[tokio::test]
    async fn retry_restores_every_value_until_resubmitted() {
        let platform = platform();
        let rejected = submission("C++ 입문", "프로그래밍", "동의 안함");
        let outcome = submit(&platform, &NameReservations::default(), &rejected)
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Rejected(_)));

        let retries = RetryRegistry::default();
        let custom_id = retries.register(4242, rejected.clone(), Duration::from_secs(3600));
        let channels = platform.list_channels(guild()).await.unwrap();
        let categories = CategoryIndex::build(&channels, "강좌");

        // Pressing twice, as after closing the form without submitting.
        for _ in 0..2 {
            let prior = retries.get(&custom_id).unwrap();
            let form = FormSpec::new(Some(&prior), &categories, "동의합니다");
            for key in FieldKey::ALL {
                assert_eq!(form.field(key).default.as_deref(), Some(rejected.get(key)));
            }
        }

        retries.remove(&custom_id);
        assert_eq!(retries.get(&custom_id), None);
    }

    /// Holds the first guild listing until released.
    struct GatedPlatform {
        inner: FakePlatform,
        release: Notify,
        listed: AtomicBool,
    }

    impl Platform for GatedPlatform {
        async fn latest_message(&self, channel: ChannelId) -> Result<Option<LatestMessage>, Error> {
            self.inner.latest_message(channel).await
        }

        async fn post_message(
            &self,
            channel: ChannelId,
            message: CreateMessage,
        ) -> Result<MessageId, Error> {
            self.inner.post_message(channel, message).await
        }

        async fn post_text(&self, channel: ChannelId, content: String) -> Result<MessageId, Error> {
            self.inner.post_text(channel, content).await
        }

        async fn list_channels(&self, guild: GuildId) -> Result<Vec<ChannelSummary>, Error> {
            if !self.listed.swap(true, Ordering::SeqCst) {
                self.release.notified().await;
            }
            self.inner.list_channels(guild).await
        }

        async fn create_text_channel(
            &self,
            guild: GuildId,
            channel: NewChannel,
        ) -> Result<ChannelId, Error> {
            self.inner.create_text_channel(guild, channel).await
        }
    }

    #[tokio::test]
    async fn rejected_submission_does_not_hold_the_name() {
        let platform = GatedPlatform {
            inner: platform(),
            release: Notify::new(),
            listed: AtomicBool::new(false),
        };
        let reservations = NameReservations::default();
        let not_agreed = submission("러스트", "기타", "싫어요");
        let valid = submission("러스트", "기타", "동의합니다");
        let settings = CourseSettings::default();

        let (first, second, ()) = tokio::join!(
            process_submission(
                &platform,
                &settings,
                &reservations,
                guild(),
                requester(),
                &not_agreed,
            ),
            process_submission(
                &platform,
                &settings,
                &reservations,
                guild(),
                requester(),
                &valid,
            ),
            async { platform.release.notify_one() },
        );

        assert_eq!(first.unwrap(), Outcome::Rejected(Rejection::NotAgreed));
        assert!(matches!(second.unwrap(), Outcome::Created(_)));
        assert_eq!(platform.inner.created().len(), 1);
    }
}
