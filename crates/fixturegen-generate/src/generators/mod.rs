use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use rand::RngCore;
use serde_json::Value;

use fixturegen_core::FieldValue;

use crate::errors::GenerationError;

mod builtin;

const MAX_UNIQUE_ATTEMPTS: u32 = 1000;

/// Locale a generator draws localized data from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Locale {
    EnUs,
    FrFr,
    PtBr,
    DeDe,
}

impl Locale {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "en_US" => Some(Self::EnUs),
            "fr_FR" => Some(Self::FrFr),
            "pt_BR" => Some(Self::PtBr),
            "de_DE" => Some(Self::DeDe),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EnUs => "en_US",
            Self::FrFr => "fr_FR",
            Self::PtBr => "pt_BR",
            Self::DeDe => "de_DE",
        }
    }
}

/// Context handed to generators for one field draw.
#[derive(Debug)]
pub struct GeneratorContext<'a> {
    pub entity: &'a str,
    pub field: &'a str,
    pub locale: Locale,
    /// Baseline for date-valued generators.
    pub base_date: NaiveDate,
}

/// A typed random-value capability, addressed by the identifier used in
/// entity models.
pub trait Generator: Send + Sync {
    fn id(&self) -> &'static str;

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        args: &[Value],
        rng: &mut dyn RngCore,
    ) -> Result<FieldValue, GenerationError>;
}

/// Registry of generator capabilities plus unique-draw bookkeeping.
///
/// Identifiers are validated against this registry before generation starts,
/// so an unknown generator type in a definition is a configuration error
/// rather than a row-time failure.
pub struct GeneratorRegistry {
    generators: HashMap<&'static str, Box<dyn Generator>>,
    unique_seen: HashMap<String, HashSet<String>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            generators: HashMap::new(),
            unique_seen: HashMap::new(),
        };
        builtin::register(&mut registry);
        registry
    }

    pub fn register_generator(&mut self, generator: Box<dyn Generator>) {
        self.generators.insert(generator.id(), generator);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.generators.contains_key(id)
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<&'static str> = self.generators.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Draw one value. With `unique`, retries until the rendered value is
    /// unseen within the (entity, field, locale) scope.
    pub fn generate(
        &mut self,
        id: &str,
        ctx: &GeneratorContext<'_>,
        args: &[Value],
        unique: bool,
        rng: &mut dyn RngCore,
    ) -> Result<FieldValue, GenerationError> {
        let generator = self.generators.get(id).ok_or_else(|| {
            GenerationError::Configuration(format!(
                "unknown generator type '{id}' on '{}.{}'",
                ctx.entity, ctx.field
            ))
        })?;

        if !unique {
            return generator.generate(ctx, args, rng);
        }

        let scope = format!("{}.{}.{}", ctx.entity, ctx.field, ctx.locale.as_str());
        let seen = self.unique_seen.entry(scope).or_default();
        for _ in 0..MAX_UNIQUE_ATTEMPTS {
            let value = generator.generate(ctx, args, rng)?;
            if seen.insert(value.render()) {
                return Ok(value);
            }
        }
        Err(GenerationError::Configuration(format!(
            "generator '{id}' exhausted unique values for '{}.{}'",
            ctx.entity, ctx.field
        )))
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ctx() -> GeneratorContext<'static> {
        GeneratorContext {
            entity: "customer",
            field: "email",
            locale: Locale::EnUs,
            base_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
        }
    }

    #[test]
    fn unknown_generator_is_a_configuration_error() {
        let mut registry = GeneratorRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = registry
            .generate("does_not_exist", &ctx(), &[], false, &mut rng)
            .expect_err("unknown id");
        assert!(matches!(err, GenerationError::Configuration(_)));
    }

    #[test]
    fn unique_draws_never_repeat_within_scope() {
        let mut registry = GeneratorRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let args = vec![Value::from(0), Value::from(31)];
        let mut seen = HashSet::new();
        for _ in 0..32 {
            let value = registry
                .generate("numberBetween", &ctx(), &args, true, &mut rng)
                .expect("unique draw");
            assert!(seen.insert(value.render()));
        }
    }

    #[test]
    fn exhausted_unique_scope_fails() {
        let mut registry = GeneratorRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let args = vec![Value::from(0), Value::from(1)];
        for _ in 0..2 {
            registry
                .generate("numberBetween", &ctx(), &args, true, &mut rng)
                .expect("draw");
        }
        let err = registry
            .generate("numberBetween", &ctx(), &args, true, &mut rng)
            .expect_err("scope exhausted");
        assert!(matches!(err, GenerationError::Configuration(_)));
    }

    #[test]
    fn builtin_catalog_is_registered() {
        let registry = GeneratorRegistry::new();
        for id in [
            "name",
            "firstName",
            "email",
            "word",
            "words",
            "sentence",
            "boolean",
            "numberBetween",
            "randomFloat",
            "dateTimeBetween",
            "uuid",
        ] {
            assert!(registry.contains(id), "missing builtin '{id}'");
        }
    }
}
