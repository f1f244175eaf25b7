//! Kotlin multiplatform resolution
//!
//! With more than one target platform a library is consumed through its common metadata
//! artifact. The source sets shared by every requested platform are cut out of that artifact
//! and repackaged one klib per source set into the transformed-libraries cache.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::{
    archive, produce_file_with_double_lock_and_hash, run_blocking, Hash, HashAlgorithm, Produced,
};
use crate::coordinates::Coordinate;
use crate::core::{
    Context, Message, ResolutionLevel, ResolutionPlatform, ResolveResult,
};
use crate::metadata::structure::unpublished_name;
use crate::metadata::{KotlinProjectStructureMetadata, ModuleMetadata, Variant, PROJECT_STRUCTURE_ENTRY};
use crate::resolver::dependency::MavenDependency;
use crate::resolver::file::DependencyFile;
use crate::resolver::variants::{native_target_matches, select_variants};

/// Libraries published without usable common metadata; their declared variant dependencies
/// are taken as children directly
const SPECIAL_LIBRARIES: &[(&str, &str)] =
    &[("org.jetbrains.kotlin", "kotlin-test-annotations-common")];

fn is_special_library(coordinate: &Coordinate) -> bool {
    SPECIAL_LIBRARIES
        .iter()
        .any(|(group, module)| coordinate.group == *group && coordinate.module == *module)
}

async fn has_directory(archive_path: &Path, directory: &str) -> ResolveResult<bool> {
    let archive_path = archive_path.to_path_buf();
    let directory = directory.to_string();
    run_blocking(move || archive::has_directory(&archive_path, &directory)).await
}

/// The metadata variant of a module and its downloaded artifact
#[derive(Debug, Clone)]
pub struct KotlinMetadataLibrary {
    pub variant: Variant,
    pub file: Arc<DependencyFile>,
}

/// Everything a [`SourceSetFallback`] may need to locate a source set
pub struct SourceSetRequest<'a> {
    pub dependency: &'a MavenDependency,
    pub context: &'a Context,
    pub metadata: &'a ModuleMetadata,
    pub structure: &'a KotlinProjectStructureMetadata,
    pub source_set: &'a str,
    pub level: ResolutionLevel,
}

/// Strategy for finding a source set missing from the common metadata artifact
#[async_trait]
pub trait SourceSetFallback: fmt::Debug + Send + Sync {
    /// Archive containing the requested source set directory, if this strategy finds one
    async fn locate(&self, request: SourceSetRequest<'_>) -> ResolveResult<Option<PathBuf>>;
}

/// Some libraries publish the iOS shared source sets only inside the metadata artifact of
/// their platform-specific modules. Looks there when an iOS target is requested.
#[derive(Debug, Clone, Copy, Default)]
pub struct IosSiblingVariantFallback;

#[async_trait]
impl SourceSetFallback for IosSiblingVariantFallback {
    async fn locate(&self, request: SourceSetRequest<'_>) -> ResolveResult<Option<PathBuf>> {
        let settings = &request.context.settings;
        let declaring = request.structure.variants_declaring(request.source_set);
        if declaring.is_empty() {
            return Ok(None);
        }

        for platform in settings.platforms.iter().copied().filter(|p| p.is_ios()) {
            let selection = select_variants(
                &request.metadata.variants,
                request.dependency.coordinate(),
                settings.scope,
                platform,
            );
            let redirect = selection
                .usable()
                .filter(|v| declaring.contains(&unpublished_name(&v.name)))
                .find_map(|v| v.available_at.clone());
            let Some(redirect) = redirect else {
                continue;
            };
            let Some(sibling) = request
                .dependency
                .child(request.context, &redirect.as_dependency())
            else {
                continue;
            };

            let module = sibling.module_file();
            if !module
                .is_downloaded_or_download(&sibling, request.context, request.level)
                .await?
            {
                continue;
            }
            let Some(metadata) = sibling.parse_module_metadata(&module, request.level).await?
            else {
                continue;
            };
            let Some(library) = detect_kotlin_metadata_library(
                &sibling,
                request.context,
                &metadata,
                platform,
                request.level,
            )
            .await?
            else {
                continue;
            };

            if let Some(path) = library.file.path() {
                if has_directory(&path, request.source_set).await? {
                    tracing::debug!(
                        source_set = request.source_set,
                        sibling = %sibling,
                        "source set found in platform metadata"
                    );
                    return Ok(Some(path));
                }
            }
        }
        Ok(None)
    }
}

pub(crate) async fn resolve_multiplatform(
    dependency: &MavenDependency,
    context: &Context,
    level: ResolutionLevel,
    metadata: &ModuleMetadata,
) -> ResolveResult<()> {
    if is_special_library(dependency.coordinate()) {
        let children = metadata
            .variants
            .iter()
            .flat_map(|v| v.dependencies.iter())
            .filter_map(|d| dependency.child(context, d))
            .collect();
        let constraints = metadata
            .variants
            .iter()
            .flat_map(|v| v.dependency_constraints.iter())
            .map(|c| dependency.constraint(context, c))
            .collect();
        dependency.set_multiplatform_result(children, constraints, Vec::new());
        return Ok(());
    }

    let Some(library) = detect_kotlin_metadata_library(
        dependency,
        context,
        metadata,
        ResolutionPlatform::Common,
        level,
    )
    .await?
    else {
        return Ok(());
    };

    resolve_kmp_library(dependency, context, metadata, &library, level).await
}

/// Locate and download the metadata artifact of `metadata` for `platform`
pub(crate) async fn detect_kotlin_metadata_library(
    dependency: &MavenDependency,
    context: &Context,
    metadata: &ModuleMetadata,
    platform: ResolutionPlatform,
    level: ResolutionLevel,
) -> ResolveResult<Option<KotlinMetadataLibrary>> {
    let variant = metadata.variants.iter().find(|v| {
        v.is_kotlin_metadata(platform.platform_type()) && native_target_matches(v, platform)
    });
    let Some(variant) = variant else {
        dependency.report(Message::error(format!(
            "Kotlin metadata variant for {} was not found in {}",
            platform, dependency
        )));
        return Ok(None);
    };

    let [file] = variant.files.as_slice() else {
        dependency.report(
            Message::error(format!(
                "Kotlin metadata variant {} of {} should contain exactly one file",
                variant.name, dependency
            ))
            .with_extra(format!("{} files", variant.files.len())),
        );
        return Ok(None);
    };

    let file = dependency.variant_file(file);
    if !file.is_downloaded_or_download(dependency, context, level).await? {
        let text = format!(
            "Kotlin metadata file {} is required for {}",
            file.name(),
            dependency
        );
        dependency.report(if level == ResolutionLevel::Network {
            Message::error(text)
        } else {
            Message::warning(text)
        });
        return Ok(None);
    }

    Ok(Some(KotlinMetadataLibrary {
        variant: variant.clone(),
        file,
    }))
}

async fn resolve_kmp_library(
    dependency: &MavenDependency,
    context: &Context,
    metadata: &ModuleMetadata,
    library: &KotlinMetadataLibrary,
    level: ResolutionLevel,
) -> ResolveResult<()> {
    let Some(archive_path) = library.file.path() else {
        dependency.report(Message::warning(format!(
            "Kotlin metadata library {} of {} was not found",
            library.file.name(),
            dependency
        )));
        return Ok(());
    };
    let text = {
        let archive_path = archive_path.clone();
        run_blocking(move || archive::read_entry(&archive_path, PROJECT_STRUCTURE_ENTRY)).await?
    };
    let Some(text) = text else {
        dependency.report(Message::error(format!(
            "Can't resolve common library {}: {} is missing from {}",
            dependency,
            PROJECT_STRUCTURE_ENTRY,
            library.file.name()
        )));
        return Ok(());
    };
    let structure = KotlinProjectStructureMetadata::parse(&text)?;

    let settings = &context.settings;
    let variant_names: Vec<String> = settings
        .platforms
        .iter()
        .copied()
        .filter(|p| *p != ResolutionPlatform::Common)
        .flat_map(|platform| {
            select_variants(&metadata.variants, dependency.coordinate(), settings.scope, platform)
                .usable()
                .map(|v| v.name.clone())
                .collect::<Vec<_>>()
        })
        .collect();
    let source_sets = structure.source_set_intersection(variant_names.iter().map(String::as_str));
    tracing::debug!(dependency = %dependency, ?source_sets, "source-set intersection");

    let sha1 = match library.file.expected_hash() {
        Some(hash) if hash.algorithm == HashAlgorithm::Sha1 => hash.value.clone(),
        _ => {
            let archive_path = archive_path.clone();
            run_blocking(move || Hash::of_file(HashAlgorithm::Sha1, &archive_path))
                .await?
                .value
        }
    };

    let produced = futures::future::join_all(source_sets.iter().map(|source_set| {
        source_set_file(
            dependency,
            context,
            metadata,
            &structure,
            &archive_path,
            source_set,
            &sha1,
            level,
        )
    }))
    .await;

    let mut source_set_files = Vec::new();
    for result in produced {
        match result {
            Ok(Some(file)) => source_set_files.push(file),
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => dependency.report(
                Message::error(format!(
                    "Failed repackaging kotlin multiplatform library {}",
                    dependency
                ))
                .with_extra(e.to_string()),
            ),
        }
    }

    let module_dependencies: BTreeSet<&str> = structure
        .source_sets_in(&source_sets)
        .flat_map(|s| s.module_dependency.iter().map(String::as_str))
        .collect();
    let mut children = Vec::new();
    for entry in module_dependencies {
        let (group, module) = match entry.split(':').collect::<Vec<_>>().as_slice() {
            [group, module] => (group.to_string(), module.to_string()),
            _ => {
                dependency.report(Message::error(format!(
                    "Unexpected module dependency format '{}' in {}",
                    entry, dependency
                )));
                continue;
            }
        };
        let declared = library
            .variant
            .dependencies
            .iter()
            .find(|d| d.group == group && d.module == module);
        if let Some(child) = declared.and_then(|d| dependency.child(context, d)) {
            children.push(child);
        }
    }

    dependency.set_multiplatform_result(children, Vec::new(), source_set_files);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn source_set_file(
    dependency: &MavenDependency,
    context: &Context,
    metadata: &ModuleMetadata,
    structure: &KotlinProjectStructureMetadata,
    archive_path: &Path,
    source_set: &str,
    sha1: &str,
    level: ResolutionLevel,
) -> ResolveResult<Option<Arc<DependencyFile>>> {
    let library = if has_directory(archive_path, source_set).await? {
        Some(archive_path.to_path_buf())
    } else {
        let mut found = None;
        for fallback in &context.settings.source_set_fallbacks {
            let request = SourceSetRequest {
                dependency,
                context,
                metadata,
                structure,
                source_set,
                level,
            };
            if let Some(path) = fallback.locate(request).await? {
                found = Some(path);
                break;
            }
        }
        found
    };
    let Some(library) = library else {
        tracing::debug!(dependency = %dependency, source_set, "source set has no content");
        return Ok(None);
    };

    let coordinate = dependency.coordinate();
    let name = format!(
        "{}-{}-{}.klib",
        coordinate.module, source_set, coordinate.version
    );
    let target = context
        .settings
        .file_cache
        .transformed_library_dir(coordinate, sha1)
        .join(&name);

    let directory = source_set.to_string();
    let produced = produce_file_with_double_lock_and_hash(&target, |temp| async move {
        let copied =
            run_blocking(move || archive::copy_directory(&library, &directory, &temp)).await;
        match copied {
            Ok(count) => {
                tracing::debug!(dependency = %dependency, count, "repackaged source set");
                Ok(Produced::Written { expected: None })
            }
            Err(e) => {
                dependency.report(
                    Message::error(format!(
                        "Failed repackaging kotlin multiplatform library {}",
                        dependency
                    ))
                    .with_extra(e.to_string()),
                );
                Ok(Produced::Declined)
            }
        }
    })
    .await?;

    Ok(produced.map(|_| Arc::new(DependencyFile::produced(coordinate.clone(), name, target))))
}
