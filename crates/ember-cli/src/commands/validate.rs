//! Scene validation command

use anyhow::{bail, Context, Result};
use ember_core::ErrorPolicy;
use ember_particles::{EngineSettings, ParticleEngine, SceneDesc, UpdateMode};
use std::path::Path;

/// What a successful validation found
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationSummary {
    pub emitters: usize,
    pub areas: usize,
    pub capacity: usize,
    pub modules: usize,
}

pub fn run(scene: &str, strict: bool) -> Result<()> {
    match check(scene, strict) {
        Ok(summary) => {
            println!(
                "{}: OK ({} emitter(s), {} area module(s), {} module(s), {} slot(s))",
                scene, summary.emitters, summary.areas, summary.modules, summary.capacity
            );
            Ok(())
        }
        Err(err) => {
            println!("{scene}: INVALID");
            for cause in err.chain() {
                println!("  {cause}");
            }
            bail!("validation failed for {scene}");
        }
    }
}

/// Parse the scene and build it in a throwaway synchronous engine.
///
/// With `strict` every out-of-range value is an error; otherwise values are
/// corrected (and logged) the way a normal run would.
pub fn check(scene: &str, strict: bool) -> Result<ValidationSummary> {
    let desc = SceneDesc::load(Path::new(scene))
        .with_context(|| format!("failed to parse {scene}"))?;

    let policy = if strict {
        ErrorPolicy::Throw
    } else {
        desc.engine.error_policy
    };
    let mut engine = ParticleEngine::new(EngineSettings {
        error_policy: policy,
        update_mode: UpdateMode::Synchronous,
        use_thread_pool: false,
        ..desc.engine.clone()
    });
    engine.initialize().context("failed to initialize particle engine")?;

    let built = desc
        .instantiate(&mut engine)
        .context("scene contains invalid values")?;

    let summary = ValidationSummary {
        emitters: built.emitters.len(),
        areas: built.areas.len(),
        capacity: built.emitters.iter().map(|h| h.lock().capacity()).sum(),
        modules: built.emitters.iter().map(|h| h.lock().module_count()).sum(),
    };
    engine.shutdown().context("shutdown failed")?;
    Ok(summary)
}
