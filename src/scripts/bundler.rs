/* src/scripts/bundler.rs */

// swc-based single-bundle compiler behind the BundleOutcome interface.
// Parse diagnostics are collected into the stats report instead of aborting,
// so watch mode can keep running across broken input.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use anyhow::{Context, Error, Result, anyhow, bail};
use swc_bundler::{Bundler, Hook, Load, ModuleData, ModuleRecord};
use swc_common::{DUMMY_SP, FileName, GLOBALS, Globals, Mark, SourceMap, Span};
use swc_ecma_ast::{EsVersion, KeyValueProp, Module};
use swc_ecma_codegen::Emitter;
use swc_ecma_codegen::text_writer::{JsWriter, WriteJs};
use swc_ecma_loader::TargetEnv;
use swc_ecma_loader::resolvers::{lru::CachingResolver, node::NodeModulesResolver};
use swc_ecma_minifier::option::{
  CompressOptions, ExtraOptions, MangleOptions, MinifyOptions, TopLevelOptions,
};
use swc_ecma_parser::{EsConfig, Syntax, parse_file_as_module};
use swc_ecma_transforms_base::fixer::fixer;
use swc_ecma_visit::VisitMutWith;

use super::{BundleConfig, BundleOutcome, BundleStats};

fn globals() -> &'static Globals {
  static CELL: OnceLock<&'static Globals> = OnceLock::new();
  CELL.get_or_init(|| Box::leak(Box::default()))
}

/// Run the bundler once against the shared config.
pub fn bundle_once(cfg: &BundleConfig) -> BundleOutcome {
  let started = Instant::now();
  if !cfg.entry.is_file() {
    return BundleOutcome::InvocationError(anyhow!("entry {} not found", cfg.entry.display()));
  }
  match run(cfg, started) {
    Ok(outcome) => outcome,
    Err(e) => BundleOutcome::InvocationError(e),
  }
}

fn run(cfg: &BundleConfig, started: Instant) -> Result<BundleOutcome> {
  let loaded = Arc::new(AtomicUsize::new(0));
  let errors = Arc::new(Mutex::new(Vec::new()));
  let cm: Arc<SourceMap> = Arc::new(SourceMap::default());

  let code = GLOBALS.set(globals(), || -> Result<String> {
    let loader = Loader {
      cm: cm.clone(),
      src_dir: cfg.src_dir.clone(),
      loaded: loaded.clone(),
      errors: errors.clone(),
    };
    let resolver = CachingResolver::new(
      4096,
      NodeModulesResolver::new(TargetEnv::Browser, Default::default(), true),
    );

    let mut bundler = Bundler::new(
      globals(),
      cm.clone(),
      loader,
      resolver,
      swc_bundler::Config { disable_dce: true, ..Default::default() },
      Box::new(ImportMetaProps),
    );

    let mut entries = HashMap::default();
    entries.insert("main".to_string(), FileName::Real(cfg.entry.clone()));
    let mut bundles = bundler.bundle(entries).context("bundler failed")?;
    let mut bundle = bundles.pop().context("bundler produced no output")?;

    if cfg.minify {
      let unresolved_mark = Mark::new();
      let top_level_mark = Mark::new();
      let opts = MinifyOptions {
        compress: Some(CompressOptions {
          top_level: Some(TopLevelOptions { functions: true }),
          ..Default::default()
        }),
        mangle: Some(MangleOptions { top_level: Some(true), ..Default::default() }),
        ..Default::default()
      };
      let extra = ExtraOptions { unresolved_mark, top_level_mark };
      bundle.module =
        swc_ecma_minifier::optimize(bundle.module.into(), cm.clone(), None, None, &opts, &extra)
          .expect_module();
      bundle.module.visit_mut_with(&mut fixer(None));
    }

    module_to_code(&bundle.module, cm.clone(), cfg.minify)
  })?;

  if let Some(parent) = cfg.out_file.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  std::fs::write(&cfg.out_file, &code)
    .with_context(|| format!("failed to write {}", cfg.out_file.display()))?;

  let stats = BundleStats {
    modules: loaded.load(Ordering::Relaxed),
    duration: started.elapsed(),
    output_bytes: code.len() as u64,
    errors: errors.lock().map(|g| g.clone()).unwrap_or_default(),
  };
  if stats.has_errors() {
    Ok(BundleOutcome::CompileReported(stats))
  } else {
    Ok(BundleOutcome::Success(stats))
  }
}

struct ImportMetaProps;

impl Hook for ImportMetaProps {
  fn get_import_meta_props(
    &self,
    _span: Span,
    _module_record: &ModuleRecord,
  ) -> Result<Vec<KeyValueProp>, Error> {
    Ok(vec![])
  }
}

struct Loader {
  cm: Arc<SourceMap>,
  src_dir: PathBuf,
  loaded: Arc<AtomicUsize>,
  errors: Arc<Mutex<Vec<String>>>,
}

impl Loader {
  fn report(&self, msg: String) {
    if let Ok(mut errors) = self.errors.lock() {
      errors.push(msg);
    }
  }
}

impl Load for Loader {
  fn load(&self, f: &FileName) -> Result<ModuleData, Error> {
    let FileName::Real(path) = f else {
      bail!("only real files can be bundled, got {f}");
    };
    let fm = self.cm.load_file(path)?;
    self.loaded.fetch_add(1, Ordering::Relaxed);

    // script rule: .js modules, resolved inside the source tree or node_modules
    let supported = path.extension().is_some_and(|ext| ext == "js" || ext == "mjs");
    if !supported && path.starts_with(&self.src_dir) {
      self.report(format!("{}: unsupported module type", path.display()));
      return Ok(ModuleData { fm, module: empty_module(), helpers: Default::default() });
    }

    let mut recovered = vec![];
    let module = match parse_file_as_module(
      &fm,
      Syntax::Es(EsConfig::default()),
      EsVersion::Es2020,
      None,
      &mut recovered,
    ) {
      Ok(module) => module,
      Err(err) => {
        self.report(format!("{}: {}", path.display(), err.kind().msg()));
        empty_module()
      }
    };
    for err in recovered {
      self.report(format!("{}: {}", path.display(), err.kind().msg()));
    }

    Ok(ModuleData { fm, module, helpers: Default::default() })
  }
}

fn empty_module() -> Module {
  Module { span: DUMMY_SP, body: vec![], shebang: None }
}

fn module_to_code(module: &Module, cm: Arc<SourceMap>, minify: bool) -> Result<String> {
  let mut buf = vec![];
  {
    let writer = JsWriter::new(cm.clone(), "\n", &mut buf, None);
    let mut emitter = Emitter {
      cfg: swc_ecma_codegen::Config::default().with_minify(minify),
      cm,
      comments: None,
      wr: Box::new(writer) as Box<dyn WriteJs>,
    };
    emitter.emit_module(module).context("failed to emit bundle")?;
  }
  String::from_utf8(buf).context("bundle is not valid utf-8")
}
