use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::types::IncludeGraph;

/// Deterministic in-memory construction of labelled dependency graphs,
/// used for property tests and equivalence checks against VCS-driven runs
/// (spec.md §2 "Scenario synthesis", L4'). Grounded on
/// `original_source/lib/scenario_creators.py`/`lib/scenario_definitions.py`:
/// those modules build named graphs from a compact header/edge
/// description rather than a real build directory, which is exactly what
/// lets Scenarios E1-E6 (spec.md §8) be expressed as plain unit tests.
#[derive(Debug, Clone, Default)]
pub struct ScenarioBuilder {
    headers: BTreeSet<PathBuf>,
    edges: Vec<(PathBuf, PathBuf)>,
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for h in headers {
            self.headers.insert(PathBuf::from(h.as_ref()));
        }
        self
    }

    pub fn edge(mut self, from: &str, to: &str) -> Self {
        self.headers.insert(PathBuf::from(from));
        self.headers.insert(PathBuf::from(to));
        self.edges.push((PathBuf::from(from), PathBuf::from(to)));
        self
    }

    pub fn edges<'a, I>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (from, to) in pairs {
            self = self.edge(from, to);
        }
        self
    }

    pub fn build(self) -> (BTreeSet<PathBuf>, IncludeGraph) {
        let mut graph: IncludeGraph = IncludeGraph::new();
        for h in &self.headers {
            graph.entry(h.clone()).or_default();
        }
        for (from, to) in &self.edges {
            graph.entry(from.clone()).or_default().insert(to.clone());
        }
        (self.headers, graph)
    }
}

/// The header/edge description of Scenario E1 (spec.md §8), factored out so
/// E2-E4 (each "take E1 and ...") can build on it directly.
pub fn scenario_e1() -> ScenarioBuilder {
    ScenarioBuilder::new()
        .headers([
            "Engine/Core.hpp",
            "Engine/Renderer.hpp",
            "Graphics/Shader.hpp",
            "Graphics/Texture.hpp",
            "Utils/Logger.hpp",
            "Utils/Math.hpp",
            "Game/Player.hpp",
            "Game/World.hpp",
            "UI/Menu.hpp",
            "UI/HUD.hpp",
        ])
        .edges([
            ("Game/Player.hpp", "Engine/Core.hpp"),
            ("Game/Player.hpp", "Graphics/Texture.hpp"),
            ("Game/Player.hpp", "Utils/Logger.hpp"),
            ("Game/World.hpp", "Engine/Core.hpp"),
            ("Game/World.hpp", "Utils/Math.hpp"),
            ("Engine/Core.hpp", "Utils/Logger.hpp"),
            ("Engine/Renderer.hpp", "Graphics/Shader.hpp"),
            ("Engine/Renderer.hpp", "Utils/Math.hpp"),
            ("Graphics/Shader.hpp", "Engine/Core.hpp"),
            ("Graphics/Shader.hpp", "Utils/Math.hpp"),
            ("UI/Menu.hpp", "Engine/Renderer.hpp"),
            ("UI/HUD.hpp", "Engine/Renderer.hpp"),
        ])
}
