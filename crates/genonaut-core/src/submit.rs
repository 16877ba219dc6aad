//! Pure `Submit` validation/normalization (§4.1). Kept free of any storage
//! port so it can be unit-tested without a database and reused identically
//! by the HTTP handler and the CLI's `submit-job --file`.

use rand::Rng;

use crate::error::GenonautError;
use crate::ports::NormalizedJobSpec;
use crate::types::{BackendKind, JobSpec, SamplerParams};

/// Legacy sentinel checkpoint name that should be treated the same as an
/// empty string (§4.1 Submit: "fallback to configured default when empty or
/// equal to a sentinel legacy value").
const LEGACY_CHECKPOINT_SENTINEL: &str = "__default__";

const MAX_RANDOM_SEED: i64 = 1_000_000_000;

pub fn validate_and_normalize(
    spec: JobSpec,
    default_checkpoint_model: &str,
) -> Result<NormalizedJobSpec, GenonautError> {
    if spec.prompt.trim().is_empty() {
        return Err(GenonautError::Validation("prompt must not be empty".into()));
    }

    let width = spec.width.unwrap_or(512);
    let height = spec.height.unwrap_or(512);
    if width == 0 || height == 0 {
        return Err(GenonautError::Validation(
            "width and height must be positive".into(),
        ));
    }

    let batch_size = spec.batch_size.unwrap_or(1);
    if batch_size == 0 {
        return Err(GenonautError::Validation(
            "batch_size must be positive".into(),
        ));
    }

    let mut sampler_params = spec.sampler_params.unwrap_or_default();
    normalize_seed(&mut sampler_params);

    let checkpoint_model = match spec.checkpoint_model.as_deref() {
        None | Some("") | Some(LEGACY_CHECKPOINT_SENTINEL) => default_checkpoint_model.to_string(),
        Some(name) => name.to_string(),
    };

    Ok(NormalizedJobSpec {
        prompt: spec.prompt,
        negative_prompt: spec.negative_prompt,
        checkpoint_model,
        lora_models: spec.lora_models,
        width,
        height,
        batch_size,
        sampler_params,
        backend: spec.backend.unwrap_or(BackendKind::Primary),
    })
}

/// seed <= 0 is replaced with a uniformly random value in `[0, 10^9]` (§4.1).
fn normalize_seed(params: &mut SamplerParams) {
    if params.seed <= 0 {
        params.seed = rand::thread_rng().gen_range(0..=MAX_RANDOM_SEED);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_spec() -> JobSpec {
        JobSpec {
            prompt: "a cat".into(),
            negative_prompt: None,
            checkpoint_model: None,
            lora_models: vec![],
            width: Some(512),
            height: Some(512),
            batch_size: None,
            sampler_params: None,
            backend: None,
        }
    }

    #[test]
    fn empty_prompt_is_rejected() {
        let mut spec = base_spec();
        spec.prompt = "   ".into();
        let err = validate_and_normalize(spec, "default.safetensors").unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn zero_width_is_rejected() {
        let mut spec = base_spec();
        spec.width = Some(0);
        let err = validate_and_normalize(spec, "default.safetensors").unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn negative_seed_is_replaced_with_random_nonnegative() {
        let mut spec = base_spec();
        spec.sampler_params = Some(SamplerParams {
            seed: -1,
            ..Default::default()
        });
        let normalized = validate_and_normalize(spec, "default.safetensors").unwrap();
        assert!(normalized.sampler_params.seed >= 0);
        assert!(normalized.sampler_params.seed <= MAX_RANDOM_SEED);
    }

    #[test]
    fn empty_checkpoint_falls_back_to_default() {
        let mut spec = base_spec();
        spec.checkpoint_model = Some(String::new());
        let normalized = validate_and_normalize(spec, "default.safetensors").unwrap();
        assert_eq!(normalized.checkpoint_model, "default.safetensors");
    }

    #[test]
    fn legacy_sentinel_checkpoint_falls_back_to_default() {
        let mut spec = base_spec();
        spec.checkpoint_model = Some(LEGACY_CHECKPOINT_SENTINEL.into());
        let normalized = validate_and_normalize(spec, "default.safetensors").unwrap();
        assert_eq!(normalized.checkpoint_model, "default.safetensors");
    }

    #[test]
    fn explicit_checkpoint_is_preserved() {
        let mut spec = base_spec();
        spec.checkpoint_model = Some("sdxl.safetensors".into());
        let normalized = validate_and_normalize(spec, "default.safetensors").unwrap();
        assert_eq!(normalized.checkpoint_model, "sdxl.safetensors");
    }

    #[test]
    fn default_backend_is_primary() {
        let spec = base_spec();
        let normalized = validate_and_normalize(spec, "default.safetensors").unwrap();
        assert_eq!(normalized.backend, BackendKind::Primary);
    }
}
