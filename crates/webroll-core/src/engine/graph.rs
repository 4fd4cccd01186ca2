//! Reference engine: import-graph concatenation.
//!
//! Entries are resolved through the chain, the static import graph is walked
//! with [`scan_imports`], and modules are concatenated dependencies-first.
//! Imports of bundled modules are removed from the code; imports that
//! resolve external are hoisted verbatim to the top of the output. JSON
//! modules are bound to a variable and stylesheets are collected into a
//! sibling `.css` output. `import()` and `require()` calls are left as-is.

use super::emit;
use super::scan::{scan_imports, ImportRecord};
use super::{BuildOptions, BuildOutput, BundleEngine, EngineError, OutputFile};
use crate::config::OutputFormat;
use crate::resolver::{
    Loader, LoadedModule, Resolution, ResolvedLocation, ResolverChain, Specifier,
};
use crate::vfs::path;
use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use tracing::debug;

/// Concatenating bundle engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphEngine;

impl GraphEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

enum Target {
    Module(usize),
    External,
}

struct Edge {
    record: ImportRecord,
    target: Target,
}

struct Module {
    location: ResolvedLocation,
    source: LoadedModule,
    imports: Vec<Edge>,
}

/// Modules loaded during one build, shared by all entries.
#[derive(Default)]
struct ModuleGraph {
    modules: Vec<Module>,
    index: FxHashMap<ResolvedLocation, usize>,
}

impl ModuleGraph {
    async fn insert(
        &mut self,
        location: ResolvedLocation,
        resolvers: &ResolverChain,
    ) -> Result<usize, EngineError> {
        if let Some(&idx) = self.index.get(&location) {
            return Ok(idx);
        }
        let source = resolvers
            .load(&location)
            .await
            .map_err(|source| EngineError::Load {
                location: location.to_string(),
                source,
            })?;
        debug!(module = %location, loader = ?source.loader, "Loaded module");

        let idx = self.modules.len();
        self.index.insert(location.clone(), idx);
        self.modules.push(Module {
            location,
            source,
            imports: Vec::new(),
        });
        Ok(idx)
    }

    /// Load everything statically reachable from `root`.
    async fn expand(&mut self, root: usize, resolvers: &ResolverChain) -> Result<(), EngineError> {
        let mut queue = VecDeque::from([root]);
        let mut seen = FxHashSet::default();

        while let Some(idx) = queue.pop_front() {
            if !seen.insert(idx) || !self.modules[idx].imports.is_empty() {
                continue;
            }
            let module = &self.modules[idx];
            if !module.source.loader.is_script() {
                continue;
            }
            let importer = module.location.clone();
            let records = scan_imports(&module.source.contents);

            let mut edges = Vec::new();
            for record in records.into_iter().filter(|r| r.kind.is_static()) {
                let specifier = Specifier::import(record.specifier.as_str(), &importer);
                let target = match resolvers.resolve(&specifier).await? {
                    Resolution::Resolved(location) => {
                        let dep = self.insert(location, resolvers).await?;
                        queue.push_back(dep);
                        Target::Module(dep)
                    }
                    _ => Target::External,
                };
                edges.push(Edge { record, target });
            }
            self.modules[idx].imports = edges;
        }
        Ok(())
    }

    fn dependencies(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.modules[idx].imports.iter().filter_map(|e| match e.target {
            Target::Module(dep) => Some(dep),
            Target::External => None,
        })
    }

    /// Post-order from `root`: every module after the modules it imports.
    /// Cycles are broken at the first revisit.
    fn order(&self, root: usize) -> Vec<usize> {
        let mut order = Vec::new();
        let mut visited = FxHashSet::default();
        visited.insert(root);
        let mut stack = vec![(root, 0usize)];

        while let Some(&(idx, next)) = stack.last() {
            match self.dependencies(idx).nth(next) {
                Some(dep) => {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    if visited.insert(dep) {
                        stack.push((dep, 0));
                    }
                }
                None => {
                    order.push(idx);
                    stack.pop();
                }
            }
        }
        order
    }

    /// Script code of one module with its static imports rewritten.
    fn rewrite(&self, idx: usize, externals: &mut Vec<String>) -> String {
        let module = &self.modules[idx];
        let contents = &module.source.contents;
        let mut edits = Vec::new();

        for edge in &module.imports {
            let Some(range) = edge.record.statement.clone() else {
                continue;
            };
            let statement = contents[range.clone()].trim();
            let replacement = match edge.target {
                Target::Module(dep) => {
                    let dep_module = &self.modules[dep];
                    match (dep_module.source.loader, emit::default_binding(statement)) {
                        (Loader::Json, Some(name)) => format!(
                            "var {name} = {};",
                            emit::json_binding(&dep_module.location.path, dep)
                        ),
                        _ => String::new(),
                    }
                }
                Target::External => {
                    if !externals.iter().any(|s| s == statement) {
                        externals.push(statement.to_string());
                    }
                    String::new()
                }
            };
            edits.push((range, replacement));
        }
        emit::splice(contents, &edits)
    }
}

/// Text emitted for one entry.
#[derive(Default)]
struct Rendered {
    script: String,
    stylesheet: String,
    externals: Vec<String>,
}

fn render_bundle(graph: &ModuleGraph, root: usize) -> Rendered {
    let mut out = Rendered::default();
    for idx in graph.order(root) {
        let module = &graph.modules[idx];
        let origin = module.location.path.as_str();
        match module.source.loader {
            Loader::Css => emit::push_css_section(&mut out.stylesheet, origin, &module.source.contents),
            Loader::Json => {
                let code = format!(
                    "var {} = {};",
                    emit::json_binding(origin, idx),
                    module.source.contents.trim()
                );
                emit::push_section(&mut out.script, origin, &code);
            }
            _ => {
                let code = graph.rewrite(idx, &mut out.externals);
                emit::push_section(&mut out.script, origin, &code);
            }
        }
    }
    out
}

fn render_single(module: &Module) -> Rendered {
    let mut out = Rendered::default();
    if module.source.loader == Loader::Css {
        out.stylesheet = module.source.contents.clone();
    } else {
        out.script = module.source.contents.clone();
    }
    out
}

/// Output stem for an entry, unique within the build.
fn output_stem(location: &ResolvedLocation, used: &mut FxHashSet<String>) -> String {
    let base = match path::file_stem(&location.path) {
        "" => "index",
        stem => stem,
    };
    let mut stem = base.to_string();
    let mut n = 2;
    while !used.insert(stem.clone()) {
        stem = format!("{base}-{n}");
        n += 1;
    }
    stem
}

#[async_trait]
impl BundleEngine for GraphEngine {
    fn name(&self) -> &str {
        "graph"
    }

    async fn build(
        &self,
        options: &BuildOptions,
        resolvers: &ResolverChain,
    ) -> Result<BuildOutput, EngineError> {
        let mut output = BuildOutput::default();
        if options.entry_points.is_empty() {
            output.warnings.push("No entry points configured".to_string());
            return Ok(output);
        }

        let mut graph = ModuleGraph::default();
        let mut used_stems = FxHashSet::default();

        for entry in &options.entry_points {
            let location = match resolvers.resolve(&Specifier::entry(entry.as_str())).await? {
                Resolution::Resolved(location) => location,
                _ => return Err(EngineError::UnresolvedEntry(entry.clone())),
            };
            let root = graph.insert(location.clone(), resolvers).await?;

            let rendered = if options.bundle {
                graph.expand(root, resolvers).await?;
                render_bundle(&graph, root)
            } else {
                render_single(&graph.modules[root])
            };

            if !rendered.externals.is_empty() && options.format != OutputFormat::Esm {
                output.warnings.push(format!(
                    "{entry}: {} external import(s) kept as ESM statements in {} output",
                    rendered.externals.len(),
                    options.format
                ));
            }

            let stem = output_stem(&location, &mut used_stems);
            if !rendered.script.is_empty() || rendered.stylesheet.is_empty() {
                let mut text = emit::wrap(options.format, &rendered.externals, &rendered.script);
                if options.minify {
                    text = emit::minify(&text);
                }
                let file = path::join(&options.outdir, &format!("{stem}.js"));
                output.output_files.push(OutputFile::from_text(file, text));
            }
            if !rendered.stylesheet.is_empty() {
                let mut text = rendered.stylesheet;
                if options.minify {
                    text = emit::minify(&text);
                }
                let file = path::join(&options.outdir, &format!("{stem}.css"));
                output.output_files.push(OutputFile::from_text(file, text));
            }
        }

        debug!(
            modules = graph.modules.len(),
            outputs = output.output_files.len(),
            "Graph build finished"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{AliasResolver, FetchError, Fetcher};
    use crate::vfs::MemoryFs;
    use std::collections::HashMap;
    use std::sync::Arc;
    use url::Url;

    #[derive(Default)]
    struct StubFetcher {
        bodies: HashMap<String, String>,
    }

    impl StubFetcher {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.bodies.insert(url.to_string(), body.to_string());
            self
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
            self.bodies
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                    reason: "Not Found".to_string(),
                })
        }
    }

    fn chain(fs: &MemoryFs, fetcher: StubFetcher) -> ResolverChain {
        ResolverChain::standard(
            Arc::new(fs.clone()),
            "/",
            AliasResolver::new(),
            Arc::new(fetcher),
        )
    }

    fn options(entry: &str) -> BuildOptions {
        BuildOptions {
            entry_points: vec![entry.to_string()],
            bundle: true,
            outdir: "/dist".to_string(),
            minify: false,
            format: OutputFormat::Esm,
        }
    }

    fn app_fs() -> MemoryFs {
        MemoryFs::new()
            .with_file(
                "/src/index.ts",
                "import { greet } from './greet';\nimport React from 'react';\nconsole.log(greet());\n",
            )
            .with_file("/src/greet.ts", "export function greet() { return 'hi'; }\n")
    }

    #[tokio::test]
    async fn test_dependencies_first_with_hoisted_externals() {
        let fs = app_fs();
        let out = GraphEngine
            .build(&options("src/index.ts"), &chain(&fs, StubFetcher::default()))
            .await
            .unwrap();

        assert_eq!(out.output_files.len(), 1);
        assert_eq!(out.output_files[0].path, "/dist/index.js");
        assert_eq!(
            out.output_files[0].text,
            "import React from 'react';\n\
             // /src/greet.ts\n\
             export function greet() { return 'hi'; }\n\
             // /src/index.ts\n\
             console.log(greet());\n"
        );
        assert!(out.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_minified_iife() {
        let fs = app_fs();
        let opts = BuildOptions {
            minify: true,
            format: OutputFormat::Iife,
            ..options("src/index.ts")
        };
        let out = GraphEngine
            .build(&opts, &chain(&fs, StubFetcher::default()))
            .await
            .unwrap();

        assert_eq!(
            out.output_files[0].text,
            "import React from 'react';\n\
             (() => {\n\
             export function greet() { return 'hi'; }\n\
             console.log(greet());\n\
             })();\n"
        );
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("iife"));
    }

    #[tokio::test]
    async fn test_unresolved_entry_is_fatal() {
        let fs = app_fs();
        let err = GraphEngine
            .build(&options("src/missing.ts"), &chain(&fs, StubFetcher::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnresolvedEntry(ref e) if e == "src/missing.ts"));
    }

    #[tokio::test]
    async fn test_json_binding_and_css_output() {
        let fs = MemoryFs::new()
            .with_file(
                "/src/main.js",
                "import data from './data.json';\nimport './style.css';\nconsole.log(data);\n",
            )
            .with_file("/src/data.json", "{\"a\": 1}\n")
            .with_file("/src/style.css", "body { margin: 0; }\n");

        let out = GraphEngine
            .build(&options("src/main.js"), &chain(&fs, StubFetcher::default()))
            .await
            .unwrap();

        let paths: Vec<_> = out.output_files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["/dist/main.js", "/dist/main.css"]);
        assert_eq!(
            out.output_files[0].text,
            "// /src/data.json\n\
             var __json_data_1 = {\"a\": 1};\n\
             // /src/main.js\n\
             var data = __json_data_1;\n\
             \n\
             console.log(data);\n"
        );
        assert_eq!(
            out.output_files[1].text,
            "/* /src/style.css */\nbody { margin: 0; }\n"
        );
    }

    #[tokio::test]
    async fn test_import_cycle_terminates() {
        let fs = MemoryFs::new()
            .with_file("/a.js", "import './b';\nexport const a = 1;\n")
            .with_file("/b.js", "import './a';\nexport const b = 2;\n");

        let out = GraphEngine
            .build(&options("a.js"), &chain(&fs, StubFetcher::default()))
            .await
            .unwrap();
        assert_eq!(
            out.output_files[0].text,
            "// /b.js\nexport const b = 2;\n// /a.js\nexport const a = 1;\n"
        );
    }

    #[tokio::test]
    async fn test_without_bundle_emits_entry_alone() {
        let fs = app_fs();
        let opts = BuildOptions {
            bundle: false,
            ..options("src/index.ts")
        };
        let out = GraphEngine
            .build(&opts, &chain(&fs, StubFetcher::default()))
            .await
            .unwrap();

        assert_eq!(out.output_files.len(), 1);
        assert_eq!(
            out.output_files[0].text,
            fs.text("/src/index.ts").unwrap()
        );
    }

    #[tokio::test]
    async fn test_remote_modules_are_inlined() {
        let fs = MemoryFs::new().with_file(
            "/src/index.ts",
            "import { x } from 'https://cdn.test/lib/x.js';\nconsole.log(x);\n",
        );
        let fetcher = StubFetcher::default()
            .with(
                "https://cdn.test/lib/x.js",
                "import { y } from './y.js';\nexport const x = y;\n",
            )
            .with("https://cdn.test/lib/y.js", "export const y = 1;\n");

        let out = GraphEngine
            .build(&options("src/index.ts"), &chain(&fs, fetcher))
            .await
            .unwrap();
        assert_eq!(
            out.output_files[0].text,
            "// https://cdn.test/lib/y.js\n\
             export const y = 1;\n\
             // https://cdn.test/lib/x.js\n\
             export const x = y;\n\
             // /src/index.ts\n\
             console.log(x);\n"
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_aborts_build() {
        let fs = MemoryFs::new().with_file(
            "/src/index.ts",
            "import 'https://cdn.test/gone.js';\n",
        );
        let err = GraphEngine
            .build(&options("src/index.ts"), &chain(&fs, StubFetcher::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Load { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_entries_share_modules_and_get_unique_names() {
        let fs = MemoryFs::new()
            .with_file("/a/main.ts", "import '../shared';\n")
            .with_file("/b/main.ts", "import '../shared';\n")
            .with_file("/shared.ts", "export const s = 1;\n");
        let opts = BuildOptions {
            entry_points: vec!["a/main.ts".to_string(), "b/main.ts".to_string()],
            ..options("unused")
        };

        let out = GraphEngine
            .build(&opts, &chain(&fs, StubFetcher::default()))
            .await
            .unwrap();
        let paths: Vec<_> = out.output_files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["/dist/main.js", "/dist/main-2.js"]);
        assert!(out.output_files[1].text.contains("export const s = 1;"));
    }
}
