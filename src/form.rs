use poise::serenity_prelude::{
    CreateActionRow, CreateInputText, CreateModal, InputTextStyle, ModalInteractionData,
};

use crate::category::CategoryIndex;

pub const MODAL_TITLE: &str = "강좌 신청";

// Discord rejects modals whose input labels are longer than this.
const MAX_LABEL_CHARS: usize = 45;

/// Keys of the course form, in render and validation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    CourseName,
    Category,
    Description,
    Agreement,
}

impl FieldKey {
    pub const ALL: [FieldKey; 4] = [
        FieldKey::CourseName,
        FieldKey::Category,
        FieldKey::Description,
        FieldKey::Agreement,
    ];

    /// Used as the custom id of the matching modal input.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKey::CourseName => "course_name",
            FieldKey::Category => "category",
            FieldKey::Description => "description",
            FieldKey::Agreement => "agreement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub key: FieldKey,
    pub label: String,
    pub placeholder: String,
    pub default: Option<String>,
    pub required: bool,
    pub max_length: Option<u16>,
    pub multiline: bool,
}

impl FormField {
    fn short(key: FieldKey, label: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            key,
            label: label.into(),
            placeholder: placeholder.into(),
            default: None,
            required: true,
            max_length: None,
            multiline: false,
        }
    }

    fn max_length(mut self, max_length: u16) -> Self {
        self.max_length = Some(max_length);
        self
    }

    fn paragraph(mut self) -> Self {
        self.multiline = true;
        self
    }

    fn prefill(mut self, prior: Option<&FormSubmission>) -> Self {
        self.default = prior
            .map(|submission| submission.get(self.key).to_string())
            .filter(|value| !value.is_empty());
        self
    }

    fn to_input(&self) -> CreateInputText {
        let style = if self.multiline {
            InputTextStyle::Paragraph
        } else {
            InputTextStyle::Short
        };

        let mut input = CreateInputText::new(
            style,
            truncate_chars(&self.label, MAX_LABEL_CHARS),
            self.key.as_str(),
        )
        .placeholder(self.placeholder.clone())
        .required(self.required);

        if let Some(max_length) = self.max_length {
            input = input.max_length(max_length);
        }
        if let Some(default) = &self.default {
            input = input.value(default.clone());
        }
        input
    }
}

/// The rendered course form: four fields in fixed order.
#[derive(Debug, Clone)]
pub struct FormSpec {
    fields: [FormField; 4],
}

impl FormSpec {
    /// Builds the form, optionally pre-filled from an earlier attempt.
    ///
    /// The category label lists the labels currently present in `categories`,
    /// so the index must be freshly built for this presentation. The agreement
    /// field asks for `consent_phrase`, the phrase validation expects.
    pub fn new(
        prior: Option<&FormSubmission>,
        categories: &CategoryIndex,
        consent_phrase: &str,
    ) -> Self {
        let labels: Vec<&str> = categories.labels().collect();

        Self {
            fields: [
                FormField::short(
                    FieldKey::CourseName,
                    "강좌 이름(채널명)",
                    "강좌 이름을 입력해주세요.",
                )
                .max_length(100)
                .prefill(prior),
                FormField::short(
                    FieldKey::Category,
                    category_label(&labels),
                    "카테고리를 입력해주세요.",
                )
                .max_length(32)
                .prefill(prior),
                FormField::short(
                    FieldKey::Description,
                    "강좌 설명",
                    "강좌 설명을 입력해주세요.",
                )
                .max_length(1024)
                .paragraph()
                .prefill(prior),
                FormField::short(
                    FieldKey::Agreement,
                    format!("강의 진행 규칙을 잘 읽고, 동의하시면 \"{consent_phrase}\"를 입력해주세요."),
                    consent_phrase,
                )
                .prefill(prior),
            ],
        }
    }

    pub fn field(&self, key: FieldKey) -> &FormField {
        // `fields` is built in `FieldKey::ALL` order.
        &self.fields[key as usize]
    }

    pub fn to_modal(&self, custom_id: impl Into<String>) -> CreateModal {
        let rows = FieldKey::ALL
            .iter()
            .map(|&key| CreateActionRow::InputText(self.field(key).to_input()))
            .collect();

        CreateModal::new(custom_id, MODAL_TITLE).components(rows)
    }
}

/// Values the member typed into one presentation of the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSubmission {
    pub course_name: String,
    pub category: String,
    pub description: String,
    pub agreement: String,
}

impl FormSubmission {
    pub fn get(&self, key: FieldKey) -> &str {
        match key {
            FieldKey::CourseName => &self.course_name,
            FieldKey::Category => &self.category,
            FieldKey::Description => &self.description,
            FieldKey::Agreement => &self.agreement,
        }
    }

    /// Collects values through `lookup`; missing fields read as empty.
    pub fn from_lookup(mut lookup: impl FnMut(&str) -> Option<String>) -> Self {
        let mut value = |key: FieldKey| lookup(key.as_str()).unwrap_or_default();

        Self {
            course_name: value(FieldKey::CourseName),
            category: value(FieldKey::Category),
            description: value(FieldKey::Description),
            agreement: value(FieldKey::Agreement),
        }
    }

    pub fn from_modal(data: &ModalInteractionData) -> Self {
        let mut data = data.clone();
        Self::from_lookup(|custom_id| poise::find_modal_text(&mut data, custom_id))
    }
}

/// `카테고리(a, b, c 등)`, dropping trailing labels until it fits a modal label.
pub fn category_label(labels: &[&str]) -> String {
    let mut shown = labels.len();
    loop {
        let label = format!("카테고리({} 등)", labels[..shown].join(", "));
        if shown == 0 || label.chars().count() <= MAX_LABEL_CHARS {
            return label;
        }
        shown -= 1;
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
