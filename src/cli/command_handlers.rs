use std::{collections::HashSet, error::Error, fmt::Write, path::Path, sync::Arc};

use log::{debug, info};

use crate::{
    cache::FileSystemPomCache,
    downloader::MavenPomDownloader,
    model::{lock::LockFile, Dependency, Pom, RawMaven},
    resolver::{RawMavenResolver, ResolverOptions},
};

/// Handler to resolve command
/// Each project is resolved on its own blocking task, sharing the downloader and its cache.
pub fn do_resolve(
    downloader: Arc<MavenPomDownloader>,
    projects: Vec<Arc<RawMaven>>,
    options: &ResolverOptions,
) -> anyhow::Result<Vec<Arc<Pom>>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let handles = projects
            .into_iter()
            .map(|project| {
                let downloader = downloader.clone();
                let options = options.clone();
                tokio::task::spawn_blocking(move || {
                    RawMavenResolver::new(downloader, options).resolve(project)
                })
            })
            .collect::<Vec<_>>();

        let mut resolved = Vec::with_capacity(handles.len());
        for handle in handles {
            resolved.push(handle.await??);
        }
        Ok(resolved)
    })
}

/// Handler to lock command
/// Writes the lock file unless its content is unchanged.
pub fn do_lock(resolved: &[Arc<Pom>], lock_file_path: &Path) -> anyhow::Result<LockFile> {
    let lock_file = LockFile::from_poms(resolved.iter().map(Arc::as_ref));
    debug!("Generated lockfile: {:?}", lock_file);

    let old_lock = if lock_file_path.exists() {
        Some(LockFile::from_file(lock_file_path)?)
    } else {
        None
    };
    if old_lock.is_some_and(|old_lock| old_lock == lock_file) {
        debug!("Lockfile is up to date");
    } else {
        std::fs::write(lock_file_path, lock_file.to_string()?)?;
        info!("Wrote lockfile to {}", lock_file_path.display());
    }

    Ok(lock_file)
}

pub fn do_clear_cache(cache: &FileSystemPomCache) -> Result<(), Box<dyn Error>> {
    cache.clear()?;
    Ok(())
}

/// Renders a resolved graph the way `mvn dependency:tree` does. Subtrees already printed
/// are marked with `(*)` instead of being repeated.
pub fn render_tree(pom: &Pom) -> String {
    let mut out = format!("{}:{}:{}:{}\n", pom.group_id, pom.artifact_id, pom.packaging, pom.version);
    let mut expanded = HashSet::new();
    render_dependencies(&pom.dependencies, "", &mut expanded, &mut out);
    out
}

fn render_dependencies<'a>(
    dependencies: &'a [Dependency],
    prefix: &str,
    expanded: &mut HashSet<(&'a str, &'a str, &'a str)>,
    out: &mut String,
) {
    for (index, dependency) in dependencies.iter().enumerate() {
        let last = index + 1 == dependencies.len();
        let model = &dependency.model;
        let key = (
            model.group_id.as_str(),
            model.artifact_id.as_str(),
            model.version.as_str(),
        );
        let repeated = !expanded.insert(key);
        let _ = writeln!(
            out,
            "{prefix}{}{}:{}:{}:{}:{}{}{}",
            if last { "\\- " } else { "+- " },
            model.group_id,
            model.artifact_id,
            dependency.type_.as_deref().unwrap_or("jar"),
            model.version,
            dependency.scope,
            if dependency.optional { " (optional)" } else { "" },
            if repeated && !model.dependencies.is_empty() { " (*)" } else { "" },
        );
        if !repeated {
            let prefix = format!("{prefix}{}", if last { "   " } else { "|  " });
            render_dependencies(&model.dependencies, &prefix, expanded, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{pom::tests::pom, Scope};

    use super::*;

    use pretty_assertions::assert_eq;

    fn dependency(model: Pom, scope: Scope) -> Dependency {
        Dependency {
            repository: None,
            scope,
            classifier: None,
            type_: None,
            optional: false,
            requested_version: Some(model.version.clone()),
            exclusions: Vec::new(),
            model: Arc::new(model),
        }
    }

    #[test]
    fn renders_tree() {
        let mut core = pom("org.example", "core", "2.0");
        core.dependencies
            .push(dependency(pom("org.example", "util", "1.0"), Scope::Runtime));
        let core = dependency(core, Scope::Compile);
        let mut api = pom("org.example", "api", "1.0");
        api.dependencies.push(core.clone());
        let mut root = pom("org.example", "app", "1.0");
        root.dependencies.push(core);
        root.dependencies.push(dependency(api, Scope::Test));

        assert_eq!(
            render_tree(&root),
            "org.example:app:jar:1.0
+- org.example:core:jar:2.0:compile
|  \\- org.example:util:jar:1.0:runtime
\\- org.example:api:jar:1.0:test
   \\- org.example:core:jar:2.0:compile (*)
"
        );
    }

    #[test]
    fn lock_file_is_rewritten_only_when_changed() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("pomfetch.lock");
        let mut root = pom("org.example", "app", "1.0");
        root.dependencies
            .push(dependency(pom("org.example", "lib", "1.0"), Scope::Compile));
        let root = Arc::new(root);

        let lock_file = do_lock(&[root.clone()], &path).unwrap();
        assert_eq!(lock_file.dependencies.len(), 1);
        std::fs::write(&path, format!("# kept\n{}", lock_file.to_string().unwrap())).unwrap();

        do_lock(&[root], &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("# kept"));
    }
}
