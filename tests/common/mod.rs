//! Shared fixtures: a small labeled corpus, entity lists and a
//! deterministic sentence encoder.

use std::path::Path;
use std::sync::Arc;

use shahnameh::embedding::{StaticWordVectors, StoreError, TextEncoder, VectorDimension};
use shahnameh::graph::{EntityPattern, compile_patterns};
use shahnameh::{Corpus, Document, Settings};

pub const KEYWORDS: [&str; 6] = ["رستم", "سهراب", "ضحاک", "کاوه", "فریدون", "سیاوش"];

/// One axis per keyword plus a constant bias axis.
pub struct KeywordEncoder {
    keywords: Vec<&'static str>,
}

impl KeywordEncoder {
    pub fn new(keywords: &[&'static str]) -> Self {
        Self {
            keywords: keywords.to_vec(),
        }
    }
}

impl TextEncoder for KeywordEncoder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, StoreError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector: Vec<f32> = self
                    .keywords
                    .iter()
                    .map(|k| text.matches(k).count() as f32)
                    .collect();
                vector.push(0.1);
                vector
            })
            .collect())
    }

    fn dimension(&self) -> VectorDimension {
        VectorDimension::new(self.keywords.len() + 1)
    }

    fn name(&self) -> String {
        format!("keywords:{}", self.keywords.join(","))
    }
}

pub fn keyword_encoder() -> Arc<dyn TextEncoder> {
    Arc::new(KeywordEncoder::new(&KEYWORDS))
}

pub fn fixture_documents() -> Vec<Document> {
    [
        ("رستم به میدان آمد - سهراب را در نبرد دید", "رزم"),
        ("سهراب جوان از سمنگان - به سوی ایران روان شد", "رزم"),
        ("تهمینه دخت شاه سمنگان - به نزد رستم آمد شبانگاه", "بزم"),
        ("افراسیاب از توران زمین - سپاهی گران کرد آماده", "رزم"),
        ("ضحاک ماردوش بر تخت نشست - جهان از ستم او به رنج افتاد", "بیداد"),
        ("کاوه آهنگر درفش برافراشت - مردم به یاری او شتافتند", "داد"),
        ("فریدون گرز گاوسر برگرفت - ضحاک را در دماوند ببست", "داد"),
        ("سیاوش از آتش گذشت - پاکی خویش را نشان داد", "آزمون"),
        ("سیاوش به توران رفت - افراسیاب او را پذیرفت", "سوگ"),
        ("رستم در زابل بزرگ شد - زال پدرش شاد بود", "بزم"),
        ("رستم بر رخش نشست - به سوی توران تاخت", "رزم"),
        ("فریدون جهان را بخش کرد - ایرج و سلم و تور", "داد"),
    ]
    .into_iter()
    .map(|(text, label)| Document::new(text, label))
    .collect()
}

pub fn fixture_corpus() -> Corpus {
    Corpus::from_documents(fixture_documents())
}

pub fn character_patterns() -> Vec<EntityPattern> {
    compile_patterns(["رستم|تهمتن", "سهراب", "تهمینه", "افراسیاب", "سیاوش", "ضحاک", "کیکاووس"])
}

pub fn place_patterns() -> Vec<EntityPattern> {
    compile_patterns(["سیستان|زابل", "توران", "سمنگان", "دماوند"])
}

pub fn fixture_word_vectors() -> Arc<StaticWordVectors> {
    let pairs = vec![
        ("رستم".to_string(), vec![1.0, 0.0, 0.0]),
        ("سهراب".to_string(), vec![0.8, 0.2, 0.0]),
        ("توران".to_string(), vec![0.0, 1.0, 0.0]),
        ("ضحاک".to_string(), vec![0.0, 0.0, 1.0]),
    ];
    Arc::new(
        StaticWordVectors::from_pairs(pairs, VectorDimension::new(3), "fixture")
            .expect("fixture vectors have width 3"),
    )
}

/// Settings rooted in `data_dir` with small, fast cluster parameters.
pub fn test_settings(data_dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.data_dir = data_dir.to_path_buf();
    settings.embeddings.shard_size = 5;
    settings.embeddings.threads = 2;
    settings.clustering.k = 3;
    settings.clustering.n_init = 3;
    settings.clustering.max_iter = 100;
    settings.graph.entities.clear();
    settings
}
