use super::user_library;
use crate::cli::{GromacsArgs, TemplatesArgs, TemplatesCommands};
use crate::config::build_templates;
use crate::data::TemplateLibrary;
use crate::error::Result;
use gmxsetup::core::templates::{TemplateOrigin, TemplateStore};
use gmxsetup::engine::error::SetupError;
use std::path::PathBuf;
use tracing::info;

pub async fn run(args: TemplatesArgs, gromacs: &GromacsArgs) -> Result<()> {
    match args.command {
        TemplatesCommands::List => handle_list()?,
        TemplatesCommands::Show { name } => handle_show(&name, gromacs)?,
        TemplatesCommands::Export { names, force } => handle_export(names, force)?,
        TemplatesCommands::Path => handle_path()?,
        TemplatesCommands::SetPath { path } => handle_set_path(path)?,
        TemplatesCommands::ResetPath => handle_reset_path()?,
    }
    Ok(())
}

fn handle_list() -> Result<()> {
    println!("Built-in templates:");
    for name in TemplateStore::builtin_names() {
        println!("  {}", name);
    }

    let library = TemplateLibrary::new()?;
    let user = library.user_templates()?;
    if user.is_empty() {
        println!("No templates in {}", library.path().display());
    } else {
        println!("Templates in {}:", library.path().display());
        for name in user {
            println!("  {}", name);
        }
    }
    Ok(())
}

fn handle_show(name: &str, gromacs: &GromacsArgs) -> Result<()> {
    let library = user_library();
    let store = build_templates(gromacs, None, library.as_deref());
    let template = store.resolve(name).map_err(SetupError::from)?;

    match &template.origin {
        TemplateOrigin::File(path) => info!("Template '{}' resolved to {:?}", name, path),
        TemplateOrigin::BuiltIn => info!("Template '{}' is built in", name),
    }
    print!("{}", template.content);
    Ok(())
}

fn handle_export(names: Vec<String>, force: bool) -> Result<()> {
    let library = TemplateLibrary::new()?;
    let names: Vec<&str> = if names.is_empty() {
        TemplateStore::builtin_names()
    } else {
        names.iter().map(String::as_str).collect()
    };

    let written = library.export_builtins(&names, force)?;
    for path in &written {
        println!("✓ Wrote {}", path.display());
    }
    if written.len() < names.len() {
        println!(
            "{} template(s) already existed and were kept (use --force to overwrite).",
            names.len() - written.len()
        );
    }
    Ok(())
}

fn handle_path() -> Result<()> {
    let library = TemplateLibrary::new()?;
    println!("{}", library.path().display());
    Ok(())
}

fn handle_set_path(path: PathBuf) -> Result<()> {
    let path = std::path::absolute(&path)?;
    TemplateLibrary::set_custom_path(&path)?;
    println!("✓ Template directory set to {}", path.display());
    Ok(())
}

fn handle_reset_path() -> Result<()> {
    TemplateLibrary::reset_path()?;
    let library = TemplateLibrary::new()?;
    println!(
        "✓ Template directory reset to {}",
        library.path().display()
    );
    Ok(())
}
