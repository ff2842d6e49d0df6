use std::sync::LazyLock;

use regex::Regex;

use crate::{form::FormSubmission, platform::ChannelSummary};

/// Anything other than word characters, whitespace and `-`.
static INVALID_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s\-]").expect("pattern is valid"));

/// Why a submission was sent back to the member.
///
/// The display text is shown to the member as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("강좌 이름에 `-`를 제외한 특수문자를 사용할 수 없습니다.")]
    InvalidCharacters,
    #[error("강의 진행 규칙에 동의해야 강좌를 만들 수 있습니다.")]
    NotAgreed,
    #[error("이미 같은 이름의 강좌가 존재합니다.")]
    DuplicateName,
}

type Rule = fn(&FormSubmission, &str) -> Result<(), Rejection>;

/// Rules that only look at the form itself.
const FORM_RULES: [Rule; 2] = [name_characters, agreement];

/// Runs the character and agreement rules in order and stops at the first
/// rejection. Needs no guild state, so it runs before a name is reserved.
pub fn check_form(submission: &FormSubmission, consent_phrase: &str) -> Result<(), Rejection> {
    FORM_RULES
        .iter()
        .try_for_each(|rule| rule(submission, consent_phrase))
}

fn name_characters(submission: &FormSubmission, _: &str) -> Result<(), Rejection> {
    if INVALID_NAME_CHARS.is_match(&submission.course_name) {
        return Err(Rejection::InvalidCharacters);
    }
    Ok(())
}

fn agreement(submission: &FormSubmission, consent_phrase: &str) -> Result<(), Rejection> {
    if submission.agreement != consent_phrase {
        return Err(Rejection::NotAgreed);
    }
    Ok(())
}

/// Last rule: no existing channel of any kind carries exactly this name.
///
/// Advisory only: another submission can create the same name before ours does.
pub fn check_unique(
    submission: &FormSubmission,
    existing_channels: &[ChannelSummary],
) -> Result<(), Rejection> {
    if existing_channels
        .iter()
        .any(|channel| channel.name == submission.course_name)
    {
        return Err(Rejection::DuplicateName);
    }
    Ok(())
}
