//! `sample`: a bounded subgraph for visualization callers.

use std::process::ExitCode;

use anyhow::Result;
use biblio_core::EntityKind;
use biblio_graph::{SampleRequest, Sampler};
use clap::Args;

use super::Context;
use crate::output;

#[derive(Args)]
pub struct SampleArgs {
    /// Maximum number of nodes (defaults to the configured budget)
    #[arg(short, long)]
    pub budget: Option<usize>,

    /// Entity kinds to include, comma separated (defaults to all)
    #[arg(short, long, value_delimiter = ',')]
    pub kinds: Vec<EntityKind>,

    /// Seed for a reproducible sample
    #[arg(long)]
    pub seed: Option<u64>,
}

impl SampleArgs {
    fn request(&self, default_budget: usize) -> SampleRequest {
        let kinds = if self.kinds.is_empty() {
            EntityKind::ALL.to_vec()
        } else {
            self.kinds.clone()
        };
        let request = SampleRequest::new(self.budget.unwrap_or(default_budget), kinds);
        match self.seed {
            Some(seed) => request.with_seed(seed),
            None => request,
        }
    }
}

pub async fn execute(args: SampleArgs, ctx: &Context) -> Result<ExitCode> {
    let graph = ctx.graph().await?;
    let request = args.request(ctx.config.sampler.default_budget);
    let sample = Sampler::new(&graph, ctx.config.sampler.clone()).sample(&request).await?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&sample)?);
    } else {
        output::print_sample(&sample, request.budget);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_kinds_means_all() {
        let args = SampleArgs {
            budget: None,
            kinds: vec![],
            seed: Some(3),
        };
        let request = args.request(300);
        assert_eq!(request.budget, 300);
        assert_eq!(request.kinds.len(), EntityKind::ALL.len());
        assert_eq!(request.seed, Some(3));
    }
}
