//! Subcommand implementations.

use anyhow::{Context, Result, bail};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, Color, Table};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use relmesh_cli::store::{load_scene, save_scene};
use relmesh_core::{ScheduleMode, TranslateMode, execute_collection, schedule, status, translate};
use relmesh_model::{
    BoneGroupProfile, Command, Profile, ScopeKind, ShapeKeyProfile, SpecRegistry,
    commands_in_scope, remove_command,
};
use relmesh_profile::load_profile;
use relmesh_scene::{ObjectId, Scene};
use relmesh_validate::validate;

use crate::cli::{
    CheckArgs, CommandsAction, CommandsArgs, ScopeArg, SetupArgs, SpecsAction, SpecsArgs,
    TranslateArgs, TranslateModeArg,
};

fn named_object(scene: &Scene, name: &str) -> Result<ObjectId> {
    scene
        .object_named(name)
        .with_context(|| format!("no object named '{name}' in the scene"))
}

pub fn run_check(args: &CheckArgs) -> Result<()> {
    let scene = load_scene(&args.scene)?;
    let trigger = named_object(&scene, &args.object)?;
    let root = validate(&scene, trigger)?;
    let root_name = scene.expect_collection(root)?.name.clone();
    println!("ok: tree rooted at '{root_name}' is valid");

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec!["Collection", "Release object", "Placement"]);
    for id in schedule(&scene, trigger, ScheduleMode::All)? {
        let entry = status::expect_setup_status(&scene, id)?;
        let placement = match status::release_placement(&scene, &entry) {
            status::ReleasePlacement::Placed => Cell::new("placed").fg(Color::Green),
            status::ReleasePlacement::Missing => Cell::new("missing").fg(Color::Yellow),
            status::ReleasePlacement::Misplaced => Cell::new("misplaced").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(&scene.expect_collection(id)?.name),
            Cell::new(entry.release_name()),
            placement,
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn run_setup(args: &SetupArgs) -> Result<()> {
    let mut scene = load_scene(&args.scene)?;
    let trigger = named_object(&scene, &args.object)?;
    validate(&scene, trigger)?;

    let mode = if args.all {
        ScheduleMode::All
    } else {
        ScheduleMode::Single
    };
    let order = schedule(&scene, trigger, mode)?;
    if order.is_empty() {
        println!("everything is up to date, nothing to build");
        return Ok(());
    }
    if args.dry_run {
        println!("would build, children first:");
        for &id in &order {
            println!("  {}", scene.expect_collection(id)?.name);
        }
        return Ok(());
    }

    let bar = ProgressBar::new(order.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .context("progress bar template")?,
    );
    let mut last = None;
    for &id in &order {
        bar.set_message(scene.expect_collection(id)?.name.clone());
        last = Some(execute_collection(&mut scene, id)?);
        bar.inc(1);
    }
    bar.finish_and_clear();

    let output = args.output.as_deref().unwrap_or(&args.scene);
    save_scene(&scene, output)?;
    if let Some(release) = last {
        let name = &scene.expect_object(release)?.name;
        println!("built {} collection(s), release object: {name}", order.len());
        info!(release = %name, collections = order.len(), "setup finished");
    }
    Ok(())
}

pub fn run_translate(args: &TranslateArgs) -> Result<()> {
    let mut scene = load_scene(&args.scene)?;
    let object = named_object(&scene, &args.object)?;
    let mode = match args.mode {
        TranslateModeArg::Sp => TranslateMode::SubstancePainter,
        TranslateModeArg::Mmd => TranslateMode::MikuMikuDance,
        TranslateModeArg::Ge => TranslateMode::GameEngine,
        TranslateModeArg::Custom => {
            let Some(postfix) = args.postfix.clone() else {
                bail!("--mode custom requires --postfix");
            };
            TranslateMode::Custom(postfix)
        }
    };

    let bonegroup: Option<BoneGroupProfile> = match &args.bonegroup {
        Some(path) => match load_profile(path)? {
            Profile::BoneGroup(profile) => Some(profile),
            Profile::ShapeKey(_) => {
                bail!("{} is a shape-key profile, expected bone-group", path.display())
            }
        },
        None => None,
    };
    let shapekey: Option<ShapeKeyProfile> = match &args.shapekey {
        Some(path) => match load_profile(path)? {
            Profile::ShapeKey(profile) => Some(profile),
            Profile::BoneGroup(_) => {
                bail!("{} is a bone-group profile, expected shape-key", path.display())
            }
        },
        None => None,
    };

    translate(&mut scene, object, &mode, bonegroup.as_ref(), shapekey.as_ref())?;
    let output = args.output.as_deref().unwrap_or(&args.scene);
    save_scene(&scene, output)?;
    println!("translated '{}' with postfix {}", args.object, mode.postfix());
    Ok(())
}

pub fn run_specs(args: &SpecsArgs) -> Result<()> {
    let mut scene = load_scene(&args.scene)?;
    match &args.action {
        SpecsAction::List => {
            print_specs(&scene.specs);
            return Ok(());
        }
        SpecsAction::Add { name } => {
            let assigned = scene.specs.add(name);
            println!("added spec '{assigned}'");
        }
        SpecsAction::Remove { name } => {
            if !scene.specs.remove(name) {
                bail!("'{name}' is reserved or not a known spec");
            }
            println!("removed spec '{name}'");
        }
        SpecsAction::Enable { name } => {
            if !scene.specs.set_enabled(name, true) {
                bail!("'{name}' is reserved or not a known spec");
            }
            println!("enabled spec '{name}'");
        }
        SpecsAction::Disable { name } => {
            if !scene.specs.set_enabled(name, false) {
                bail!("'{name}' is reserved or not a known spec");
            }
            println!("disabled spec '{name}'");
        }
    }
    save_scene(&scene, &args.scene)
}

pub fn run_commands(args: &CommandsArgs) -> Result<()> {
    let mut scene = load_scene(&args.scene)?;
    let object = named_object(&scene, &args.object)?;
    match &args.action {
        CommandsAction::List { scope } => {
            let handle = scene.expect_object(object)?;
            let selected: Vec<&Command> = match scope {
                Some(scope) => commands_in_scope(&handle.commands, scope_kind(*scope)),
                None => handle.commands.iter().collect(),
            };
            print_commands(&selected);
            return Ok(());
        }
        CommandsAction::Remove { index } => {
            let commands = &mut scene.expect_object_mut(object)?.commands;
            let before = commands.len();
            remove_command(commands, *index);
            if commands.len() == before {
                bail!("no command with index {index} on '{}'", args.object);
            }
            println!("removed command {index} from '{}'", args.object);
        }
    }
    save_scene(&scene, &args.scene)
}

fn scope_kind(scope: ScopeArg) -> ScopeKind {
    match scope {
        ScopeArg::VertexGroup => ScopeKind::VertexGroup,
        ScopeArg::ShapeKey => ScopeKind::ShapeKey,
        ScopeArg::Uv => ScopeKind::Uv,
        ScopeArg::Modifier => ScopeKind::Modifier,
        ScopeArg::Material => ScopeKind::Material,
    }
}

fn print_commands(commands: &[&Command]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec!["Index", "Kind", "Source", "Spec"]);
    for command in commands {
        table.add_row(vec![
            Cell::new(command.index),
            Cell::new(command.args.kind_name()),
            Cell::new(&command.source),
            Cell::new(&command.spec),
        ]);
    }
    println!("{table}");
}

fn print_specs(specs: &SpecRegistry) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec!["Spec", "Enabled", "Reserved"]);
    for spec in specs.iter() {
        let enabled = if spec.enabled {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::DarkGrey)
        };
        let reserved = if SpecRegistry::is_reserved(&spec.name) {
            "yes"
        } else {
            ""
        };
        table.add_row(vec![Cell::new(&spec.name), enabled, Cell::new(reserved)]);
    }
    println!("{table}");
}
