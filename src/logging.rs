use log::LevelFilter;
use log4rs::{
    append::{
        console::ConsoleAppender,
        rolling_file::{
            RollingFileAppender,
            policy::compound::{
                CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
            },
        },
    },
    config::{Appender, Config as Log4rsConfig, Root},
    encode::pattern::PatternEncoder,
};
use poise::serenity_prelude::{ChannelId, User};

use crate::{Error, form::FormSubmission};

const LOG_PATTERN: &str = "[{d(%Y-%m-%d %H:%M:%S)}] {l} <{M}> [{L}] >> {m}{n}";

/// Configures log4rs for file rotation and stdout logging. Call once at startup.
pub fn init() -> Result<(), Error> {
    let window_roller = FixedWindowRoller::builder()
        .base(1)
        .build("logs/latest.{}.log", 30)?;

    let size_trigger = SizeTrigger::new(10 * 1024 * 1024); // 10MB

    let compound_policy = CompoundPolicy::new(Box::new(size_trigger), Box::new(window_roller));

    let file_appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build("logs/latest.log", Box::new(compound_policy))?;

    let stdout_appender = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();

    let log_config = Log4rsConfig::builder()
        .appender(Appender::builder().build("file", Box::new(file_appender)))
        .appender(Appender::builder().build("stdout", Box::new(stdout_appender)))
        .build(
            Root::builder()
                .appender("file")
                .appender("stdout")
                .build(LevelFilter::Info),
        )?;

    log4rs::init_config(log_config)?;
    Ok(())
}

/// Records a created course channel.
pub fn log_course_created(requester: &User, channel: ChannelId, submission: &FormSubmission) {
    log::info!(
        "Course created: {} | {} ({}) | {} | {} | {}",
        channel,
        requester.name,
        requester.id,
        submission.course_name,
        submission.category,
        one_line(&submission.description)
    );
}

/// Records a failed provisioning with everything needed to reproduce it.
pub fn log_course_failed(requester: &User, submission: &FormSubmission, error: &dyn std::error::Error) {
    log::error!(
        "Ignoring exception in course form\n신청자: {} ({})\n강좌명: {}\n카테고리: {}\n강좌 설명: {}\nerror: {:?}",
        requester.name,
        requester.id,
        submission.course_name,
        submission.category,
        one_line(&submission.description),
        error
    );
}

fn one_line(text: &str) -> String {
    text.replace('\n', " \\n ")
}
