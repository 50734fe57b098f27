//! Localized site content: a flat dotted-key lookup table compiled at startup.
//!
//! The site catalog is the single source of truth for every user-facing
//! string and for the factual knowledge the assistant is allowed to use.
//! Lookups fail closed: a missing key comes back as the key itself.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Site display language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    En,
    /// The site boots in Arabic.
    #[default]
    Ar,
}

/// A single catalog entry holding both translations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizedText {
    pub en: String,
    pub ar: String,
}

impl LocalizedText {
    pub fn get(&self, lang: Lang) -> &str {
        match lang {
            Lang::En => &self.en,
            Lang::Ar => &self.ar,
        }
    }
}

/// Flat dotted-key → localized-text table.
///
/// Keys use dotted paths (`"chatbot.welcome"`, `"services.express"`); the
/// table is built once and never mutated afterwards. A `BTreeMap` keeps
/// [`ContentCatalog::snapshot`] deterministic.
#[derive(Debug, Clone)]
pub struct ContentCatalog {
    entries: BTreeMap<String, LocalizedText>,
}

impl ContentCatalog {
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, LocalizedText)>,
    {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// The built-in catalog for The Fast Bird shipping site.
    pub fn site() -> Self {
        let mut entries = BTreeMap::new();
        let mut add = |key: &str, en: &str, ar: &str| {
            entries.insert(
                key.to_string(),
                LocalizedText {
                    en: en.to_string(),
                    ar: ar.to_string(),
                },
            );
        };

        // Company facts, the assistant's sole grounding.
        add("company.name", "The Fast Bird", "الطير السريع");
        add(
            "company.about",
            "The Fast Bird is an Egyptian shipping company delivering parcels and freight across Egypt and the Gulf since 2015.",
            "الطير السريع شركة شحن مصرية بتوصل الطرود والبضائع في مصر والخليج من سنة 2015.",
        );
        add(
            "company.coverage",
            "We ship from Cairo, Alexandria, and Giza to Saudi Arabia, the UAE, Kuwait, and Qatar.",
            "بنشحن من القاهرة والإسكندرية والجيزة للسعودية والإمارات والكويت وقطر.",
        );
        add(
            "services.express",
            "Express delivery: door to door within 2-4 business days.",
            "الشحن السريع: من الباب للباب خلال 2-4 أيام عمل.",
        );
        add(
            "services.standard",
            "Standard delivery: 5-10 business days at our best rates.",
            "الشحن العادي: من 5 لـ 10 أيام عمل بأفضل الأسعار.",
        );
        add(
            "services.tracking",
            "Every shipment gets a tracking code you can follow on the Track Order page.",
            "كل شحنة ليها كود تتبع تقدر تتابعه من صفحة تتبع الطلب.",
        );
        add(
            "contact.phone",
            "Call us on +20 100 555 0199, Saturday to Thursday, 9am-6pm.",
            "اتصل بينا على ‎+20 100 555 0199 من السبت للخميس، 9 صباحاً لـ 6 مساءً.",
        );
        add(
            "contact.email",
            "Email: support@thefastbird.example",
            "الإيميل: support@thefastbird.example",
        );
        add(
            "orderNow.calculator.note",
            "The shipping calculator gives an initial cost estimate by weight and destination.",
            "حاسبة الشحن بتديك تقدير مبدئي للتكلفة حسب الوزن والوجهة.",
        );
        add(
            "orderNow.form.note",
            "The order form lets you place a pickup request directly online.",
            "نموذج الطلب بيخليك تسجل طلب استلام أونلاين على طول.",
        );

        // Chatbot strings.
        add("chatbot.name", "Sha'a", "شعاع");
        add(
            "chatbot.tagline",
            "Your shipping assistant",
            "مساعدك في الشحن",
        );
        add(
            "chatbot.welcome",
            "Welcome to The Fast Bird! I'm Sha'a, your shipping assistant.",
            "أهلاً بيك في الطير السريع! أنا شعاع، مساعدك في الشحن.",
        );
        add(
            "chatbot.askName",
            "What's your name?",
            "ممكن أعرف اسمك؟",
        );
        add("chatbot.hello", "Hello", "أهلاً يا");
        add(
            "chatbot.howHelp",
            "How can I help you today?",
            "أقدر أساعدك إزاي النهارده؟",
        );
        add(
            "chatbot.error",
            "Sorry, something went wrong. Please try again in a moment.",
            "معلش، حصلت مشكلة. جرب تاني كمان شوية.",
        );
        add(
            "chatbot.placeholder",
            "Type your message...",
            "اكتب رسالتك...",
        );
        add("chatbot.voice", "Voice", "الصوت");
        add("chatbot.speechRate", "Speech rate", "سرعة الكلام");
        add(
            "chatbot.speechRateNote",
            "Speech rate is not yet applied to generated audio.",
            "سرعة الكلام لسه مش بتتطبق على الصوت المولد.",
        );

        Self { entries }
    }

    /// Look up a dotted key for the given language.
    ///
    /// Missing keys fail closed: the key itself is returned, so a typo
    /// shows up on screen instead of panicking the widget.
    pub fn text(&self, key: &str, lang: Lang) -> String {
        match self.entries.get(key) {
            Some(entry) => entry.get(lang).to_string(),
            None => key.to_string(),
        }
    }

    /// Serialize the whole catalog as the knowledge-base snapshot embedded
    /// into the persona context. Deterministic across calls.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(&self.entries).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
