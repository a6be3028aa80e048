use chrono::{Duration, NaiveDateTime, NaiveTime};
use fake::Fake;
use fake::faker::address::raw::{CityName, CountryName, StreetName, ZipCode};
use fake::faker::company::raw::CompanyName;
use fake::faker::internet::raw::{FreeEmail, IPv4, SafeEmail, Username};
use fake::faker::lorem::raw::{Paragraph, Sentence, Word, Words};
use fake::faker::name::raw::{FirstName, LastName, Name};
use fake::faker::phone_number::raw::PhoneNumber;
use fake::locales::{DE_DE, EN, FR_FR, PT_BR};
use rand::{Rng, RngCore};
use serde_json::Value;

use fixturegen_core::FieldValue;

use crate::errors::GenerationError;
use crate::generators::{Generator, GeneratorContext, GeneratorRegistry, Locale};

const DEFAULT_INT_MIN: i64 = 0;
const DEFAULT_INT_MAX: i64 = 10000;
const DEFAULT_FLOAT_MAX: f64 = 10000.0;
const DEFAULT_WORD_COUNT: usize = 3;
const DEFAULT_SENTENCE_WORDS: usize = 6;
const DEFAULT_PARAGRAPH_SENTENCES: usize = 3;

pub fn register(registry: &mut GeneratorRegistry) {
    for id in ["name", "firstName", "lastName"] {
        registry.register_generator(Box::new(PersonGenerator { id }));
    }
    for id in ["email", "safeEmail", "userName", "ipv4"] {
        registry.register_generator(Box::new(InternetGenerator { id }));
    }
    for id in ["word", "words", "sentence", "paragraph"] {
        registry.register_generator(Box::new(LoremGenerator { id }));
    }
    for id in ["city", "country", "postcode", "streetName"] {
        registry.register_generator(Box::new(AddressGenerator { id }));
    }
    registry.register_generator(Box::new(CompanyGenerator));
    registry.register_generator(Box::new(PhoneGenerator));
    registry.register_generator(Box::new(BooleanGenerator));
    for id in ["numberBetween", "randomDigit", "randomNumber", "randomFloat"] {
        registry.register_generator(Box::new(NumberGenerator { id }));
    }
    for id in ["date", "dateTimeBetween", "unixTime"] {
        registry.register_generator(Box::new(DateGenerator { id }));
    }
    registry.register_generator(Box::new(UuidGenerator));
    registry.register_generator(Box::new(Md5Generator));
}

macro_rules! localized_string {
    ($locale:expr, $rng:expr, $faker:ident) => {
        match $locale {
            Locale::EnUs => $faker(EN).fake_with_rng::<String, _>($rng),
            Locale::FrFr => $faker(FR_FR).fake_with_rng::<String, _>($rng),
            Locale::PtBr => $faker(PT_BR).fake_with_rng::<String, _>($rng),
            Locale::DeDe => $faker(DE_DE).fake_with_rng::<String, _>($rng),
        }
    };
    ($locale:expr, $rng:expr, $faker:ident, $out:ty, $($extra:expr),+) => {
        match $locale {
            Locale::EnUs => $faker(EN, $($extra),+).fake_with_rng::<$out, _>($rng),
            Locale::FrFr => $faker(FR_FR, $($extra),+).fake_with_rng::<$out, _>($rng),
            Locale::PtBr => $faker(PT_BR, $($extra),+).fake_with_rng::<$out, _>($rng),
            Locale::DeDe => $faker(DE_DE, $($extra),+).fake_with_rng::<$out, _>($rng),
        }
    };
}

struct PersonGenerator {
    id: &'static str,
}

impl Generator for PersonGenerator {
    fn id(&self) -> &'static str {
        self.id
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        _args: &[Value],
        rng: &mut dyn RngCore,
    ) -> Result<FieldValue, GenerationError> {
        let value = match self.id {
            "firstName" => localized_string!(ctx.locale, rng, FirstName),
            "lastName" => localized_string!(ctx.locale, rng, LastName),
            _ => localized_string!(ctx.locale, rng, Name),
        };
        Ok(FieldValue::Text(value))
    }
}

struct InternetGenerator {
    id: &'static str,
}

impl Generator for InternetGenerator {
    fn id(&self) -> &'static str {
        self.id
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        _args: &[Value],
        rng: &mut dyn RngCore,
    ) -> Result<FieldValue, GenerationError> {
        let value = match self.id {
            "safeEmail" => localized_string!(ctx.locale, rng, SafeEmail),
            "userName" => localized_string!(ctx.locale, rng, Username),
            "ipv4" => localized_string!(ctx.locale, rng, IPv4),
            _ => localized_string!(ctx.locale, rng, FreeEmail),
        };
        Ok(FieldValue::Text(value))
    }
}

struct LoremGenerator {
    id: &'static str,
}

impl Generator for LoremGenerator {
    fn id(&self) -> &'static str {
        self.id
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        args: &[Value],
        rng: &mut dyn RngCore,
    ) -> Result<FieldValue, GenerationError> {
        let value = match self.id {
            "words" => {
                let count = arg_usize(args, 0).unwrap_or(DEFAULT_WORD_COUNT).max(1);
                let words = localized_string!(
                    ctx.locale,
                    rng,
                    Words,
                    Vec<String>,
                    count..count + 1
                );
                words.join(" ")
            }
            "sentence" => {
                let words = arg_usize(args, 0).unwrap_or(DEFAULT_SENTENCE_WORDS).max(1);
                localized_string!(ctx.locale, rng, Sentence, String, words..words + 1)
            }
            "paragraph" => {
                let sentences = arg_usize(args, 0)
                    .unwrap_or(DEFAULT_PARAGRAPH_SENTENCES)
                    .max(1);
                localized_string!(ctx.locale, rng, Paragraph, String, sentences..sentences + 1)
            }
            _ => localized_string!(ctx.locale, rng, Word),
        };
        Ok(FieldValue::Text(value))
    }
}

struct AddressGenerator {
    id: &'static str,
}

impl Generator for AddressGenerator {
    fn id(&self) -> &'static str {
        self.id
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        _args: &[Value],
        rng: &mut dyn RngCore,
    ) -> Result<FieldValue, GenerationError> {
        let value = match self.id {
            "country" => localized_string!(ctx.locale, rng, CountryName),
            "postcode" => localized_string!(ctx.locale, rng, ZipCode),
            "streetName" => localized_string!(ctx.locale, rng, StreetName),
            _ => localized_string!(ctx.locale, rng, CityName),
        };
        Ok(FieldValue::Text(value))
    }
}

struct CompanyGenerator;

impl Generator for CompanyGenerator {
    fn id(&self) -> &'static str {
        "company"
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        _args: &[Value],
        rng: &mut dyn RngCore,
    ) -> Result<FieldValue, GenerationError> {
        Ok(FieldValue::Text(localized_string!(
            ctx.locale,
            rng,
            CompanyName
        )))
    }
}

struct PhoneGenerator;

impl Generator for PhoneGenerator {
    fn id(&self) -> &'static str {
        "phoneNumber"
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        _args: &[Value],
        rng: &mut dyn RngCore,
    ) -> Result<FieldValue, GenerationError> {
        Ok(FieldValue::Text(localized_string!(
            ctx.locale,
            rng,
            PhoneNumber
        )))
    }
}

struct BooleanGenerator;

impl Generator for BooleanGenerator {
    fn id(&self) -> &'static str {
        "boolean"
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        args: &[Value],
        rng: &mut dyn RngCore,
    ) -> Result<FieldValue, GenerationError> {
        let chance = arg_i64(args, 0).unwrap_or(50).clamp(0, 100);
        Ok(FieldValue::from(rng.random_bool(chance as f64 / 100.0)))
    }
}

struct NumberGenerator {
    id: &'static str,
}

impl Generator for NumberGenerator {
    fn id(&self) -> &'static str {
        self.id
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        args: &[Value],
        rng: &mut dyn RngCore,
    ) -> Result<FieldValue, GenerationError> {
        match self.id {
            "randomDigit" => Ok(FieldValue::Int(rng.random_range(0..=9))),
            "randomNumber" => Ok(FieldValue::Int(rng.random_range(0..=99_999_999))),
            "randomFloat" => {
                let scale = arg_i64(args, 0).unwrap_or(2).clamp(0, 9) as i32;
                let min = arg_f64(args, 1).unwrap_or(0.0);
                let max = arg_f64(args, 2).unwrap_or(DEFAULT_FLOAT_MAX);
                if min > max {
                    return Err(GenerationError::Configuration(
                        "randomFloat: min must be <= max".to_string(),
                    ));
                }
                let factor = 10_f64.powi(scale);
                let value = (rng.random_range(min..=max) * factor).round() / factor;
                Ok(FieldValue::Float(value))
            }
            _ => {
                let min = arg_i64(args, 0).unwrap_or(DEFAULT_INT_MIN);
                let max = arg_i64(args, 1).unwrap_or(DEFAULT_INT_MAX);
                if min > max {
                    return Err(GenerationError::Configuration(
                        "numberBetween: min must be <= max".to_string(),
                    ));
                }
                Ok(FieldValue::Int(rng.random_range(min..=max)))
            }
        }
    }
}

struct DateGenerator {
    id: &'static str,
}

impl Generator for DateGenerator {
    fn id(&self) -> &'static str {
        self.id
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        args: &[Value],
        rng: &mut dyn RngCore,
    ) -> Result<FieldValue, GenerationError> {
        match self.id {
            "unixTime" => {
                let upper = NaiveDateTime::new(ctx.base_date, NaiveTime::MIN)
                    .and_utc()
                    .timestamp()
                    .max(1);
                Ok(FieldValue::Int(rng.random_range(0..=upper)))
            }
            "dateTimeBetween" => {
                let start = relative_days(arg_str(args, 0).unwrap_or("-1 year"))?;
                let end = relative_days(arg_str(args, 1).unwrap_or("now"))?;
                if start > end {
                    return Err(GenerationError::Configuration(
                        "dateTimeBetween: start must not be after end".to_string(),
                    ));
                }
                let offset = rng.random_range(start..=end);
                let date = ctx.base_date + Duration::days(offset);
                let seconds = rng.random_range(0..86_400);
                let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)
                    .unwrap_or_default();
                Ok(FieldValue::Text(
                    NaiveDateTime::new(date, time)
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string(),
                ))
            }
            _ => {
                let offset = rng.random_range(-365..=0);
                let date = ctx.base_date + Duration::days(offset);
                Ok(FieldValue::Text(date.format("%Y-%m-%d").to_string()))
            }
        }
    }
}

/// Day offset for relative bounds like `now`, `-2 years`, `+10 days`.
fn relative_days(spec: &str) -> Result<i64, GenerationError> {
    let spec = spec.trim();
    if spec.is_empty() || spec.eq_ignore_ascii_case("now") {
        return Ok(0);
    }
    let mut parts = spec.split_whitespace();
    let amount = parts.next().and_then(|value| value.parse::<i64>().ok());
    let unit = parts
        .next()
        .map(|unit| unit.trim_end_matches('s').to_ascii_lowercase());
    let (Some(amount), Some(unit)) = (amount, unit) else {
        return Err(GenerationError::Configuration(format!(
            "invalid relative date '{spec}'"
        )));
    };
    let days_per_unit = match unit.as_str() {
        "year" => 365,
        "month" => 30,
        "week" => 7,
        "day" => 1,
        _ => {
            return Err(GenerationError::Configuration(format!(
                "invalid relative date unit '{unit}'"
            )));
        }
    };
    Ok(amount * days_per_unit)
}

struct UuidGenerator;

impl Generator for UuidGenerator {
    fn id(&self) -> &'static str {
        "uuid"
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        _args: &[Value],
        rng: &mut dyn RngCore,
    ) -> Result<FieldValue, GenerationError> {
        let mut bytes = [0_u8; 16];
        rng.fill_bytes(&mut bytes);
        bytes[6] = (bytes[6] & 0x0f) | 0x40;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;
        Ok(FieldValue::Text(uuid::Uuid::from_bytes(bytes).to_string()))
    }
}

struct Md5Generator;

impl Generator for Md5Generator {
    fn id(&self) -> &'static str {
        "md5"
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        _args: &[Value],
        rng: &mut dyn RngCore,
    ) -> Result<FieldValue, GenerationError> {
        Ok(FieldValue::Text(format!("{:032x}", rng.random::<u128>())))
    }
}

fn arg_i64(args: &[Value], index: usize) -> Option<i64> {
    args.get(index).and_then(Value::as_i64)
}

fn arg_f64(args: &[Value], index: usize) -> Option<f64> {
    args.get(index).and_then(Value::as_f64)
}

fn arg_str(args: &[Value], index: usize) -> Option<&str> {
    args.get(index).and_then(Value::as_str)
}

fn arg_usize(args: &[Value], index: usize) -> Option<usize> {
    arg_i64(args, index).and_then(|value| usize::try_from(value).ok())
}
