// Integration tests for the rule builder registry

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use rulebuilder::Config;
use rulebuilder::fragments::memory::MemoryFragmentService;
use rulebuilder::fragments::{
	EmptyFragmentService, FileFragmentService, FragmentService, FragmentStoreError, RuleFragment,
};
use rulebuilder::functions::{
	CatalogBuilder, FunctionCatalog, FunctionDescriptor, FunctionPlugin, ReturnType, builtin_catalog,
};
use rulebuilder::registry::{RegistryError, RegistryState, RuleBuilderRegistry};
use rulebuilder::template::TemplateError;
use serde_json::json;
use tempfile::NamedTempFile;

fn small_catalog() -> Arc<FunctionCatalog> {
	let mut builder = CatalogBuilder::new();
	builder
		.register(FunctionDescriptor::new("is_null", ReturnType::Boolean).rule_builder_enabled())
		.register(FunctionDescriptor::new("set_field", ReturnType::Void).rule_builder_enabled());
	Arc::new(builder.build().unwrap())
}

fn condition(name: &str, source: &str) -> RuleFragment {
	RuleFragment::condition(
		FunctionDescriptor::new(name, ReturnType::Boolean).rule_builder_enabled(),
		source,
	)
}

fn action(name: &str, source: &str) -> RuleFragment {
	RuleFragment::action(
		FunctionDescriptor::new(name, ReturnType::Void).rule_builder_enabled(),
		source,
	)
}

fn names(blocks: &rulebuilder::registry::BuildingBlocks) -> Vec<&str> {
	blocks.keys().map(String::as_str).collect()
}

async fn wait_for_generation(registry: &RuleBuilderRegistry, generation: u64) -> anyhow::Result<()> {
	tokio::time::timeout(Duration::from_secs(5), async {
		while registry.snapshot().map(|s| s.generation()).unwrap_or(0) < generation {
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
	})
	.await?;
	Ok(())
}

/// Catalog functions and fragments are split into conditions and actions
#[tokio::test]
async fn test_functions_and_fragments_are_classified() -> anyhow::Result<()> {
	let service = Arc::new(MemoryFragmentService::with_fragments(vec![
		condition("my_condition", "has_field(\"${field}\")"),
		action("my_action", "set_field(\"${field}\", ${value});"),
	]));
	let registry = RuleBuilderRegistry::new(small_catalog(), service);
	registry.initialize().await?;

	assert_eq!(names(&*registry.conditions()?), vec!["is_null", "my_condition"]);
	assert_eq!(names(&*registry.actions()?), vec!["set_field", "my_action"]);
	Ok(())
}

/// Enabled boolean functions are conditions, other enabled ones actions, and
/// disabled ones appear nowhere
#[tokio::test]
async fn test_builtin_classification() -> anyhow::Result<()> {
	let catalog = Arc::new(builtin_catalog()?);
	let registry =
		RuleBuilderRegistry::new(catalog.clone(), Arc::new(MemoryFragmentService::new()));
	registry.initialize().await?;
	let snapshot = registry.snapshot()?;

	for function in catalog.all() {
		let in_conditions = snapshot.conditions().contains_key(&function.name);
		let in_actions = snapshot.actions().contains_key(&function.name);
		match (function.rule_builder_enabled, function.return_type.is_boolean()) {
			(true, true) => assert!(in_conditions && !in_actions, "{}", function.name),
			(true, false) => assert!(!in_conditions && in_actions, "{}", function.name),
			(false, _) => assert!(!in_conditions && !in_actions, "{}", function.name),
		}
	}
	assert!(snapshot.templates().is_empty());
	Ok(())
}

struct InternalPlugin;

impl FunctionPlugin for InternalPlugin {
	fn name(&self) -> &str {
		"internal"
	}

	fn functions(&self) -> Vec<FunctionDescriptor> {
		vec![
			FunctionDescriptor::new("route_check", ReturnType::Boolean)
				.rule_builder_enabled()
				.internal(),
			FunctionDescriptor::new("route_to", ReturnType::Void)
				.rule_builder_enabled()
				.internal(),
		]
	}
}

/// Internal functions are only offered through the internal views
#[tokio::test]
async fn test_internal_functions_only_in_internal_views() -> anyhow::Result<()> {
	let mut builder = CatalogBuilder::new();
	builder
		.register(FunctionDescriptor::new("is_null", ReturnType::Boolean).rule_builder_enabled())
		.extend(&InternalPlugin);
	let registry = RuleBuilderRegistry::new(
		Arc::new(builder.build()?),
		Arc::new(MemoryFragmentService::new()),
	);
	registry.initialize().await?;
	let snapshot = registry.snapshot()?;

	assert!(!snapshot.conditions().contains_key("route_check"));
	assert!(!snapshot.actions().contains_key("route_to"));
	assert!(snapshot.conditions_with_internal().contains_key("route_check"));
	assert!(snapshot.actions_with_internal().contains_key("route_to"));
	assert!(snapshot.conditions_with_internal().contains_key("is_null"));
	Ok(())
}

/// A fragment named like a built-in replaces it, including its classification
#[tokio::test]
async fn test_fragment_overrides_builtin() -> anyhow::Result<()> {
	let service = Arc::new(MemoryFragmentService::with_fragments(vec![condition(
		"to_string",
		"is_string(${value})",
	)]));
	let registry = RuleBuilderRegistry::new(Arc::new(builtin_catalog()?), service);
	registry.initialize().await?;
	let snapshot = registry.snapshot()?;

	assert!(snapshot.conditions()["to_string"].is_fragment());
	assert!(!snapshot.actions().contains_key("to_string"));
	assert!(!snapshot.actions_with_internal().contains_key("to_string"));
	assert_eq!(
		snapshot.render("to_string", &json!({"value": "$message.src"}))?,
		"is_string($message.src)"
	);
	Ok(())
}

/// The rule builder flag applies to fragments the same way as to functions
#[tokio::test]
async fn test_disabled_fragment_is_absent_everywhere() -> anyhow::Result<()> {
	let disabled = RuleFragment::condition(
		FunctionDescriptor::new("draft_condition", ReturnType::Boolean),
		"true",
	);
	let service = Arc::new(MemoryFragmentService::with_fragments(vec![disabled]));
	let registry = RuleBuilderRegistry::new(small_catalog(), service);
	registry.initialize().await?;
	let snapshot = registry.snapshot()?;

	assert!(!snapshot.conditions().contains_key("draft_condition"));
	assert!(!snapshot.actions().contains_key("draft_condition"));
	assert!(!snapshot.conditions_with_internal().contains_key("draft_condition"));
	assert!(!snapshot.actions_with_internal().contains_key("draft_condition"));
	assert_matches!(
		snapshot.render("draft_condition", &json!({})),
		Err(RegistryError::UnknownBuildingBlock(_))
	);
	Ok(())
}

/// A change notification makes a new fragment visible without losing others
#[tokio::test]
async fn test_notification_adds_fragment() -> anyhow::Result<()> {
	let service = Arc::new(MemoryFragmentService::with_fragments(vec![condition(
		"my_condition",
		"true",
	)]));
	let registry = Arc::new(RuleBuilderRegistry::new(small_catalog(), service.clone()));
	registry.initialize().await?;
	let (publisher, _handles) = registry.start_background_tasks(None)?;

	service.upsert(condition("new_condition", "${x} > 1"));
	assert!(publisher.notify());
	wait_for_generation(&registry, 2).await?;

	assert_eq!(
		names(&*registry.conditions()?),
		vec!["is_null", "my_condition", "new_condition"]
	);
	assert_eq!(names(&*registry.actions()?), vec!["set_field"]);
	Ok(())
}

/// Queued notifications are folded into a single reload
#[tokio::test]
async fn test_notification_burst_is_coalesced() -> anyhow::Result<()> {
	let service = Arc::new(MemoryFragmentService::new());
	let registry = Arc::new(RuleBuilderRegistry::new(small_catalog(), service.clone()));
	registry.initialize().await?;
	let (publisher, _handles) = registry.start_background_tasks(None)?;

	service.upsert(action("burst", "drop_message();"));
	for _ in 0..5 {
		publisher.notify();
	}
	wait_for_generation(&registry, 2).await?;
	tokio::time::sleep(Duration::from_millis(50)).await;

	assert_eq!(registry.snapshot()?.generation(), 2);
	assert_eq!(service.reads(), 2);
	assert!(registry.actions()?.contains_key("burst"));
	Ok(())
}

/// A store failure during reload leaves the published snapshot untouched
#[tokio::test]
async fn test_failed_reload_keeps_previous_snapshot() -> anyhow::Result<()> {
	let service = Arc::new(MemoryFragmentService::with_fragments(vec![condition(
		"my_condition",
		"true",
	)]));
	let registry = Arc::new(RuleBuilderRegistry::new(small_catalog(), service.clone()));
	registry.initialize().await?;
	let before = registry.snapshot()?;
	let (publisher, _handles) = registry.start_background_tasks(None)?;

	service.replace(vec![]);
	service.fail_next(1);
	publisher.notify();
	tokio::time::timeout(Duration::from_secs(5), async {
		while service.reads() < 2 {
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
	})
	.await?;
	tokio::time::sleep(Duration::from_millis(20)).await;

	let after = registry.snapshot()?;
	assert!(Arc::ptr_eq(&before, &after));
	assert_eq!(registry.state(), RegistryState::Ready);
	assert!(registry.conditions()?.contains_key("my_condition"));
	Ok(())
}

/// Reads before the first successful build are rejected, not empty
#[tokio::test]
async fn test_reads_before_initialization() -> anyhow::Result<()> {
	let service = Arc::new(MemoryFragmentService::new());
	service.fail_next(1);
	let registry = RuleBuilderRegistry::new(small_catalog(), service);

	assert_matches!(registry.initialize().await, Err(RegistryError::FragmentStore(_)));
	assert_matches!(registry.actions(), Err(RegistryError::NotInitialized));

	registry.initialize().await?;
	assert_eq!(names(&*registry.actions()?), vec!["set_field"]);
	Ok(())
}

/// A fragment with a template that does not compile is still listed but has
/// no template, and is reported
#[tokio::test]
async fn test_broken_template_does_not_block_snapshot() -> anyhow::Result<()> {
	let service = Arc::new(MemoryFragmentService::with_fragments(vec![
		condition("good", "has_field(\"${field}\")"),
		action("sneaky", "${\"freemarker.template.utility.Execute\"?new()(\"id\")}"),
		action("unbalanced", "<#if x>set_field(\"a\", 1);"),
	]));
	let registry = RuleBuilderRegistry::new(small_catalog(), service);
	registry.initialize().await?;
	let snapshot = registry.snapshot()?;

	assert!(snapshot.actions().contains_key("sneaky"));
	assert!(snapshot.template("good").is_some());
	assert!(snapshot.template("sneaky").is_none());
	assert!(snapshot.template("unbalanced").is_none());

	let errors: Vec<_> = snapshot.fragment_errors().iter().map(|e| e.name.as_str()).collect();
	assert_eq!(errors, vec!["sneaky", "unbalanced"]);
	assert_matches!(
		snapshot.fragment_errors()[0].error,
		TemplateError::ForbiddenBuiltin { .. }
	);
	assert_matches!(snapshot.fragment_errors()[1].error, TemplateError::Syntax { .. });
	Ok(())
}

/// Fragments read from a file are picked up again on reload
#[tokio::test]
async fn test_file_backed_reload() -> anyhow::Result<()> {
	let file = NamedTempFile::with_suffix(".json")?;
	std::fs::write(
		file.path(),
		r#"{"fragments": [{
			"descriptor": {"name": "from_file", "returnType": "boolean", "ruleBuilderEnabled": true},
			"isCondition": true,
			"fragment": "${a} == ${b}"
		}]}"#,
	)?;

	let registry = RuleBuilderRegistry::new(
		small_catalog(),
		Arc::new(FileFragmentService::new(file.path())),
	);
	registry.initialize().await?;
	assert!(registry.conditions()?.contains_key("from_file"));

	std::fs::write(
		file.path(),
		r#"{"fragments": [{
			"descriptor": {"name": "from_file_v2", "returnType": "void", "ruleBuilderEnabled": true},
			"fragment": "remove_field(\"${field}\");"
		}]}"#,
	)?;
	assert_eq!(registry.reload().await?, 2);
	assert!(!registry.conditions()?.contains_key("from_file"));
	assert!(registry.actions()?.contains_key("from_file_v2"));

	std::fs::write(file.path(), "{ broken")?;
	assert_matches!(registry.reload().await, Err(RegistryError::FragmentStore(_)));
	assert!(registry.actions()?.contains_key("from_file_v2"));
	assert_eq!(registry.snapshot()?.generation(), 2);
	Ok(())
}

/// Returns a different fragment set on every read and takes a while to do so
#[derive(Default)]
struct SlowFragmentService {
	reads: AtomicUsize,
	in_flight: AtomicUsize,
	max_in_flight: AtomicUsize,
}

#[async_trait]
impl FragmentService for SlowFragmentService {
	async fn all(&self) -> Result<Vec<RuleFragment>, FragmentStoreError> {
		let read = self.reads.fetch_add(1, Ordering::SeqCst);
		let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
		self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
		tokio::time::sleep(Duration::from_millis(20)).await;
		self.in_flight.fetch_sub(1, Ordering::SeqCst);
		Ok(vec![
			condition(&format!("read_{read}"), "true"),
			action(&format!("read_{read}_action"), "drop_message();"),
		])
	}
}

/// Concurrent reloads run one after the other and the last one wins whole
#[tokio::test]
async fn test_concurrent_reloads_are_serialized() -> anyhow::Result<()> {
	let service = Arc::new(SlowFragmentService::default());
	let registry = RuleBuilderRegistry::new(small_catalog(), service.clone());
	registry.initialize().await?;

	let (first, second) = tokio::join!(registry.reload(), registry.reload());
	assert_eq!(first?, 2);
	assert_eq!(second?, 3);
	assert_eq!(service.max_in_flight.load(Ordering::SeqCst), 1);

	let snapshot = registry.snapshot()?;
	assert_eq!(snapshot.generation(), 3);
	assert_eq!(names(snapshot.conditions()), vec!["is_null", "read_2"]);
	assert_eq!(names(snapshot.actions()), vec!["set_field", "read_2_action"]);
	assert!(snapshot.template("read_1").is_none());
	assert!(snapshot.template("read_2").is_some());
	Ok(())
}

/// Functions added under plugins.internalFunctions never reach the public views
#[tokio::test]
async fn test_config_internal_functions_are_not_public() -> anyhow::Result<()> {
	let config = Config::parse(
		Path::new("rulebuilder.yaml"),
		r#"
plugins:
  internalFunctions:
    - name: diag_check
      returnType: boolean
      ruleBuilderEnabled: true
"#,
	)?;
	let registry =
		RuleBuilderRegistry::new(Arc::new(config.catalog()?), Arc::new(EmptyFragmentService));
	registry.initialize().await?;
	let snapshot = registry.snapshot()?;

	assert!(!snapshot.conditions().contains_key("diag_check"));
	assert!(snapshot.conditions_with_internal().contains_key("diag_check"));
	Ok(())
}
