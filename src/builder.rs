//! Routes → clap Command help
//!
//! Renders usage and per-route help text by building clap `Command`s from
//! the registry's declarations. Binding itself does not go through clap:
//! clap has no pass-through mode for tokens it does not recognise.

use clap::{Arg, ArgAction, Command};

use crate::spec::{ArgSpec, ObjectSpec, Positional, RouteSpec};

/// Build the top-level usage command listing every route.
///
/// Structure: `<app> [--remote <name>] <operation> [args] [--options]`
pub fn build_usage(app: &str, routes: &[&RouteSpec], objects: &[&ObjectSpec]) -> Command {
    let mut root = Command::new(app.to_owned())
        .disable_help_flag(true)
        .disable_help_subcommand(true)
        .override_usage(format!(
            "{app} [--remote <name>] <operation> [args...]\n       {app} help <operation>"
        ))
        .arg(
            Arg::new("remote")
                .long("remote")
                .value_name("name")
                .action(ArgAction::Set)
                .help("Use the named remote profile instead of the default URL"),
        );

    for route in routes {
        root = root.subcommand(
            Command::new(route.name.clone()).about(route.doc.clone().unwrap_or_default()),
        );
    }

    if !objects.is_empty() {
        let mut text = String::from("Objects (create <object>, search <object>, delete <object>):\n");
        for object in objects {
            match &object.doc {
                Some(doc) => text.push_str(&format!("  {}  {}\n", object.name, doc)),
                None => text.push_str(&format!("  {}\n", object.name)),
            }
        }
        root = root.after_help(text);
    }

    root
}

/// Render the top-level usage text.
pub fn usage(app: &str, routes: &[&RouteSpec], objects: &[&ObjectSpec]) -> String {
    build_usage(app, routes, objects).render_help().to_string()
}

/// Build the help command for a single route.
pub fn build_route_command(route: &RouteSpec) -> Command {
    let mut cmd = Command::new(route.name.clone())
        .disable_help_flag(true)
        .about(route.doc.clone().unwrap_or_default());

    if let Some(description) = &route.attributes.description {
        cmd = cmd.after_help(description.clone());
    }

    match route.args() {
        Some(args) => {
            for spec in args {
                cmd = cmd.arg(build_arg(spec));
            }
        }
        None => {
            cmd = cmd.arg(
                Arg::new("args")
                    .value_name("ARG")
                    .num_args(0..)
                    .action(ArgAction::Append)
                    .help("Path segments, or YAML files and host:path references to send"),
            );
        }
    }

    cmd
}

/// Render help text for a single route.
pub fn route_help(route: &RouteSpec) -> String {
    build_route_command(route).render_help().to_string()
}

fn build_arg(spec: &ArgSpec) -> Arg {
    let mut help = String::from(if spec.required {
        "[required]"
    } else {
        "[optional]"
    });
    if !spec.doc.is_empty() {
        help.push(' ');
        help.push_str(&spec.doc);
    }
    if let Some(default) = &spec.default {
        help.push_str(&format!(" [default: {default}]"));
    }

    let arg = Arg::new(spec.name.clone()).help(help);
    let value_name = spec.name.to_uppercase();

    // Positionals can also be given as --name, but clap renders an arg
    // either as positional or as an option, not both.
    match spec.positional {
        Some(Positional::One) => arg.value_name(value_name).action(ArgAction::Set),
        Some(Positional::Many) => arg
            .value_name(value_name)
            .num_args(1..)
            .action(ArgAction::Append),
        None => {
            let arg = arg
                .long(spec.name.clone())
                .visible_aliases(spec.alt.clone());
            if spec.is_flag() {
                arg.action(ArgAction::SetTrue)
            } else {
                arg.value_name(value_name).action(ArgAction::Set)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{HttpMethod, RouteAttributes};

    fn route_with_args(args: Vec<ArgSpec>) -> RouteSpec {
        let mut route = RouteSpec::new("foo", HttpMethod::Get, "/foo").doc("Do the foo");
        route.attributes = RouteAttributes {
            args: Some(args),
            description: Some("Longer explanation of foo.".into()),
            ..RouteAttributes::default()
        };
        route
    }

    #[test]
    fn route_help_lists_arguments_with_markers() {
        let route = route_with_args(vec![
            ArgSpec::string("name").required().doc("A name"),
            ArgSpec::flag("verbose").alt("v").doc("Talk more"),
            ArgSpec::string("color").default_value("red"),
        ]);

        let help = route_help(&route);
        assert!(help.contains("Do the foo"), "help: {help}");
        assert!(help.contains("--name <NAME>"), "help: {help}");
        assert!(help.contains("[required] A name"), "help: {help}");
        assert!(help.contains("--verbose"), "help: {help}");
        assert!(help.contains("[optional] Talk more"), "help: {help}");
        assert!(help.contains("[default: red]"), "help: {help}");
        assert!(help.contains("Longer explanation of foo."), "help: {help}");
    }

    #[test]
    fn route_help_renders_positionals() {
        let route = route_with_args(vec![
            ArgSpec::string("first").positional(Positional::One),
            ArgSpec::string("rest").positional(Positional::Many),
        ]);

        let help = route_help(&route);
        assert!(help.contains("FIRST"), "help: {help}");
        assert!(help.contains("REST"), "help: {help}");
    }

    #[test]
    fn route_help_for_legacy_route_describes_free_arguments() {
        let route = RouteSpec::new("status", HttpMethod::Get, "/status");
        let help = route_help(&route);
        assert!(help.contains("ARG"), "help: {help}");
    }

    #[test]
    fn usage_lists_routes_and_objects() {
        let status = RouteSpec::new("status", HttpMethod::Get, "/status").doc("Service status");
        let widget = RouteSpec::new("widget", HttpMethod::Get, "/widget");
        let object = ObjectSpec {
            name: "widget".into(),
            url: "/widget".into(),
            doc: Some("Widgets".into()),
        };

        let text = usage("myapp", &[&status, &widget], &[&object]);
        assert!(text.contains("myapp [--remote <name>] <operation>"), "usage: {text}");
        assert!(text.contains("status"), "usage: {text}");
        assert!(text.contains("Service status"), "usage: {text}");
        assert!(text.contains("widget  Widgets"), "usage: {text}");
    }

    #[test]
    fn route_named_help_does_not_clash_with_clap() {
        let route = route_with_args(vec![ArgSpec::flag("help")]);
        let help = route_help(&route);
        assert!(help.contains("--help"), "help: {help}");
    }
}
