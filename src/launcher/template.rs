//! Rendering a version descriptor into a command line.

use crate::launcher::manifest::{ArgumentToken, Library, Rule, RuleAction, VersionDetails};
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Values substituted for `${name}` placeholders.
pub type TemplateValues = HashMap<String, String>;

#[cfg(windows)]
const CLASSPATH_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const CLASSPATH_SEPARATOR: &str = ":";

/// Library-relative path of the main class wrapper jar.
pub const WRAPPER_JAR_PATH: &str = "com/greenappers/empirelauncher/1.0.0/empirelauncher-1.0.0.jar";

/// Entry point of the wrapper jar.
pub const WRAPPER_MAIN_CLASS: &str = "com.greenappers.empirelauncher.EmpireLauncher";

/// Environment variable the wrapper reads the real main class from.
pub const WRAPPED_MAIN_CLASS_ENV: &str = "EMPIRELAUNCHER_MAIN_CLASS";

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{(\w+)\}").expect("valid regex"))
}

/// The platform rules are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformContext {
    pub os_name: String,
    pub os_arch: String,
    pub features: BTreeMap<String, bool>,
}

impl PlatformContext {
    pub fn new(os_name: &str, os_arch: &str) -> Self {
        Self {
            os_name: os_name.to_string(),
            os_arch: os_arch.to_string(),
            features: BTreeMap::new(),
        }
    }

    /// The host platform, named the way version descriptors name platforms.
    pub fn current() -> Self {
        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_arch = match std::env::consts::ARCH {
            "x86_64" => "x64",
            "aarch64" => "arm64",
            other => other,
        };
        Self::new(os_name, os_arch)
    }

    fn matches(&self, rule: &Rule) -> bool {
        if let Some(os) = &rule.os {
            if os.name.as_deref().is_some_and(|name| name != self.os_name) {
                return false;
            }
            if os.arch.as_deref().is_some_and(|arch| arch != self.os_arch) {
                return false;
            }
        }
        rule.features
            .iter()
            .flatten()
            .all(|(name, wanted)| self.features.get(name) == Some(wanted))
    }
}

/// Whether an entry gated by `rules` applies on `context`.
///
/// Allow rules must match. A disallow rule excludes the entry only when it matches.
pub fn allow_rules(context: &PlatformContext, rules: Option<&[Rule]>) -> bool {
    rules.unwrap_or_default().iter().all(|rule| match rule.action {
        RuleAction::Allow => context.matches(rule),
        RuleAction::Disallow => !context.matches(rule),
    })
}

/// Replace `${name}` placeholders. Unknown names are left as written.
pub fn replace_template_variables(input: &str, values: &TemplateValues) -> String {
    placeholder()
        .replace_all(input, |caps: &Captures| {
            values
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Render `tokens` into `output`, dropping conditional entries whose rules fail.
pub fn apply_arguments_template(
    context: &PlatformContext,
    tokens: &[ArgumentToken],
    values: &TemplateValues,
    output: &mut Vec<String>,
) {
    for token in tokens {
        match token {
            ArgumentToken::Literal(text) => output.push(replace_template_variables(text, values)),
            ArgumentToken::Conditional { rules, value } => {
                if !allow_rules(context, Some(rules)) {
                    continue;
                }
                output.extend(
                    value
                        .values()
                        .iter()
                        .map(|text| replace_template_variables(text, values)),
                );
            }
        }
    }
}

/// Drop every `--flag ""` pair.
pub fn filter_blank_arguments(input: Vec<String>) -> Vec<String> {
    let mut output = Vec::with_capacity(input.len());
    let mut iter = input.into_iter().peekable();
    while let Some(argument) = iter.next() {
        if argument.starts_with("--") && iter.peek().is_some_and(|next| next.is_empty()) {
            iter.next();
            continue;
        }
        output.push(argument);
    }
    output
}

/// Local path of the game client jar.
pub fn client_jar_path(libraries_dir: &Path, version: &str) -> PathBuf {
    libraries_dir
        .join("com")
        .join("mojang")
        .join("minecraft")
        .join(version)
        .join(format!("minecraft-{version}-client.jar"))
}

/// Local path of a library artifact, if it has one.
pub fn library_path(libraries_dir: &Path, library: &Library) -> Option<PathBuf> {
    library
        .downloads
        .artifact
        .as_ref()
        .map(|artifact| libraries_dir.join(&artifact.path))
}

/// Join the applicable library jars in order, then the wrapper jar when
/// `wrap_main_class` is set, then the client jar.
pub fn build_classpath(
    context: &PlatformContext,
    libraries_dir: &Path,
    libraries: &[Library],
    wrap_main_class: bool,
    client_jar: &Path,
) -> String {
    let wrapper = wrap_main_class.then(|| libraries_dir.join(WRAPPER_JAR_PATH));
    libraries
        .iter()
        .filter(|library| allow_rules(context, library.rules.as_deref()))
        .filter_map(|library| library_path(libraries_dir, library))
        .chain(wrapper)
        .chain(std::iter::once(client_jar.to_path_buf()))
        .map(|path| path.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(CLASSPATH_SEPARATOR)
}

/// Full argv: java, JVM arguments, main class, game arguments, extras.
///
/// With `wrap_main_class` the wrapper's entry point replaces the descriptor's
/// main class, which the wrapper then reads from [`WRAPPED_MAIN_CLASS_ENV`].
pub fn render_command(
    java: &str,
    details: &VersionDetails,
    context: &PlatformContext,
    values: &TemplateValues,
    extra_arguments: &[String],
    wrap_main_class: bool,
) -> Vec<String> {
    let mut command = vec![java.to_string()];
    apply_arguments_template(context, &details.arguments.jvm, values, &mut command);
    if wrap_main_class {
        command.push(WRAPPER_MAIN_CLASS.to_string());
    } else {
        command.push(details.main_class.clone());
    }
    apply_arguments_template(context, &details.arguments.game, values, &mut command);
    command.extend(extra_arguments.iter().cloned());
    filter_blank_arguments(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::manifest::{ArgumentValue, OsRule};

    fn values(pairs: &[(&str, &str)]) -> TemplateValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn os_rule(action: RuleAction, name: &str) -> Rule {
        Rule {
            action,
            os: Some(OsRule {
                name: Some(name.to_string()),
                arch: None,
            }),
            features: None,
        }
    }

    #[test]
    fn test_unknown_placeholders_are_kept() {
        let rendered = replace_template_variables(
            "--user ${auth_player_name} --x ${missing}",
            &values(&[("auth_player_name", "Alex")]),
        );
        assert_eq!(rendered, "--user Alex --x ${missing}");
    }

    #[test]
    fn test_rules() {
        let linux = PlatformContext::new("linux", "x64");
        assert!(allow_rules(&linux, None));
        assert!(allow_rules(&linux, Some(&[os_rule(RuleAction::Allow, "linux")])));
        assert!(!allow_rules(&linux, Some(&[os_rule(RuleAction::Allow, "osx")])));
        assert!(!allow_rules(
            &linux,
            Some(&[
                Rule { action: RuleAction::Allow, os: None, features: None },
                os_rule(RuleAction::Disallow, "linux"),
            ])
        ));
        assert!(allow_rules(&linux, Some(&[os_rule(RuleAction::Disallow, "osx")])));
    }

    #[test]
    fn test_feature_rules_require_enabled_feature() {
        let mut context = PlatformContext::new("linux", "x64");
        let rule = Rule {
            action: RuleAction::Allow,
            os: None,
            features: Some(BTreeMap::from([("is_demo_user".to_string(), true)])),
        };
        assert!(!allow_rules(&context, Some(std::slice::from_ref(&rule))));
        context.features.insert("is_demo_user".to_string(), true);
        assert!(allow_rules(&context, Some(&[rule])));
    }

    #[test]
    fn test_conditional_arguments() {
        let context = PlatformContext::new("linux", "x64");
        let tokens = vec![
            ArgumentToken::Literal("-Djava.library.path=${natives_directory}".to_string()),
            ArgumentToken::Conditional {
                rules: vec![os_rule(RuleAction::Allow, "osx")],
                value: ArgumentValue::One("-XstartOnFirstThread".to_string()),
            },
            ArgumentToken::Conditional {
                rules: vec![os_rule(RuleAction::Allow, "linux")],
                value: ArgumentValue::Many(vec!["-Xss1M".to_string(), "-Dx=y".to_string()]),
            },
        ];
        let mut output = Vec::new();
        apply_arguments_template(
            &context,
            &tokens,
            &values(&[("natives_directory", "/n")]),
            &mut output,
        );
        assert_eq!(output, vec!["-Djava.library.path=/n", "-Xss1M", "-Dx=y"]);
    }

    #[test]
    fn test_filter_blank_arguments() {
        let input: Vec<String> = ["java", "--clientId", "", "--xuid", "", "--width", "800", "--last"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            filter_blank_arguments(input),
            vec!["java", "--width", "800", "--last"]
        );

        let trailing = vec!["--flag".to_string(), "".to_string()];
        assert!(filter_blank_arguments(trailing).is_empty());

        let lone_blank = vec!["value".to_string(), "".to_string()];
        assert_eq!(filter_blank_arguments(lone_blank.clone()), lone_blank);
    }

    #[test]
    fn test_wrapper_jar_precedes_client_jar() {
        let context = PlatformContext::new("linux", "x64");
        let libs = Path::new("/libs");
        let client = client_jar_path(libs, "1.21");

        let plain = build_classpath(&context, libs, &[], false, &client);
        assert_eq!(plain, client.to_string_lossy());

        let wrapped = build_classpath(&context, libs, &[], true, &client);
        let expected = [libs.join(WRAPPER_JAR_PATH), client]
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(CLASSPATH_SEPARATOR);
        assert_eq!(wrapped, expected);
    }

    #[test]
    fn test_client_jar_path() {
        let path = client_jar_path(Path::new("/libs"), "1.21");
        assert!(path.ends_with("com/mojang/minecraft/1.21/minecraft-1.21-client.jar"));
    }
}
