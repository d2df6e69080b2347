//! Genome operations — sampling, crossover, mutation and phenotype
//! construction over the schema-constrained parameter space.
//!
//! A genome is the map of varied fields only; the phenotype is the base
//! options struct with the genome patched over its serialized form. Every
//! operation ends with a constraint pass, so genomes are always inside their
//! descriptors' domains.

use debut_core::schema::{GeneticSchema, SchemaDescriptor, SchemaValue};
use debut_core::StrategyOptions;
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::BTreeMap;
use thiserror::Error;

/// Varied fields of one candidate, keyed by option field name.
pub type Genome = BTreeMap<String, SchemaValue>;

#[derive(Debug, Error)]
pub enum GenomeError {
    #[error("options patch failed: {0}")]
    Patch(#[from] serde_json::Error),
    #[error("options do not serialize to an object")]
    NotAnObject,
}

/// Uniform draw of a full genome.
pub fn sample_genome(schema: &GeneticSchema, rng: &mut StdRng) -> Genome {
    schema
        .iter()
        .map(|(field, descriptor)| (field.clone(), descriptor.sample(rng)))
        .collect()
}

/// Field-by-field recombination of two parents. With `weights` the fitter
/// parent's genes are proportionally more likely to be inherited; without,
/// the choice is uniform.
pub fn crossover(
    schema: &GeneticSchema,
    a: &Genome,
    b: &Genome,
    weights: Option<(f64, f64)>,
    rng: &mut StdRng,
) -> Genome {
    let p_first = match weights {
        Some((fa, fb)) if fa.is_finite() && fb.is_finite() => {
            // Shift both weights above zero; degenerate sums fall back to 0.5.
            let floor = fa.min(fb).min(0.0);
            let (wa, wb) = (fa - floor, fb - floor);
            if wa + wb > 0.0 {
                wa / (wa + wb)
            } else {
                0.5
            }
        }
        _ => 0.5,
    };

    schema
        .iter()
        .map(|(field, descriptor)| {
            let parent = if rng.gen_bool(p_first) { a } else { b };
            let gene = parent
                .get(field)
                .copied()
                .unwrap_or_else(|| descriptor.sample(rng));
            (field.clone(), descriptor.constrain(gene))
        })
        .collect()
}

/// Per-field mutation. Numeric genes get a span-scaled perturbation within
/// their descriptor bounds; boolean genes flip with the mutation probability
/// rather than being perturbed continuously.
pub fn mutate(
    schema: &GeneticSchema,
    genome: &mut Genome,
    rate: f64,
    jitter: f64,
    rng: &mut StdRng,
) {
    for (field, descriptor) in schema {
        if !rng.gen_bool(rate.clamp(0.0, 1.0)) {
            continue;
        }
        let current = genome
            .get(field)
            .copied()
            .unwrap_or_else(|| descriptor.sample(rng));
        let mutated = match (descriptor, current) {
            (SchemaDescriptor::Bool, SchemaValue::Bool(v)) => SchemaValue::Bool(!v),
            (SchemaDescriptor::Number { min, max, .. }, SchemaValue::Number(v)) => {
                let span = max - min;
                let step = rng.gen_range(-1.0..=1.0) * jitter * span;
                SchemaValue::Number(v + step)
            }
            _ => descriptor.sample(rng),
        };
        genome.insert(field.clone(), descriptor.constrain(mutated));
    }
}

/// Build the phenotype: patch the base options' serialized form with the
/// genome and deserialize.
pub fn apply_genome(base: &StrategyOptions, genome: &Genome) -> Result<StrategyOptions, GenomeError> {
    let mut json = serde_json::to_value(base)?;
    let object = json.as_object_mut().ok_or(GenomeError::NotAnObject)?;
    for (field, gene) in genome {
        object.insert(field.clone(), gene.to_json());
    }
    Ok(serde_json::from_value(json)?)
}
