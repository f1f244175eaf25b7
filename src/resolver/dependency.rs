//! The per-coordinate resolution state machine
//!
//! A [`MavenDependency`] is shared by every node requesting its coordinate. Resolution reads
//! the POM, switches to Gradle module metadata when the POM says so (or is missing), and
//! records the selected variants or packaging together with child dependencies. Problems
//! local to the coordinate become [`Message`]s; only fatal errors are returned.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};

use crate::coordinates::{is_version_range, Coordinate, Key, VersionRequirement};
use crate::core::{
    Context, Message, ResolutionLevel, ResolutionState, ResolveResult, Settings, Severity,
};
use crate::metadata::module::ModuleDependency;
use crate::metadata::pom::publishes_gradle_metadata;
use crate::metadata::{ModuleMetadata, Project, Variant};
use crate::registry::Repository;
use crate::resolver::file::DependencyFile;
use crate::resolver::kmp;
use crate::resolver::variants::select_variants;

/// Parent POM chains longer than this are cut off
const MAX_PARENT_DEPTH: usize = 10;

/// Outcome of the resolve step, replaced wholesale on every successful step
#[derive(Debug, Clone, Default)]
pub struct ResolvedData {
    /// Selected variants (metadata-based resolution)
    pub variants: Vec<Variant>,
    /// Packaging (POM-based resolution)
    pub packaging: Option<String>,
    pub children: Arc<Vec<Arc<MavenDependency>>>,
    pub constraints: Arc<Vec<Arc<MavenDependencyConstraint>>>,
    /// Repackaged multiplatform source-set libraries
    pub source_set_files: Vec<Arc<DependencyFile>>,
}

/// The resolvable unit for one coordinate
pub struct MavenDependency {
    coordinate: Coordinate,
    state: AtomicU8,
    data: RwLock<ResolvedData>,
    messages: Mutex<Vec<Message>>,
    repository: OnceCell<Repository>,
    resolve_lock: tokio::sync::Mutex<()>,
    files: DashMap<String, Arc<DependencyFile>>,
}

impl MavenDependency {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            state: AtomicU8::new(ResolutionState::Initial as u8),
            data: RwLock::new(ResolvedData::default()),
            messages: Mutex::new(Vec::new()),
            repository: OnceCell::new(),
            resolve_lock: tokio::sync::Mutex::new(()),
            files: DashMap::new(),
        }
    }

    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    pub fn key(&self) -> Key {
        self.coordinate.key()
    }

    pub fn state(&self) -> ResolutionState {
        ResolutionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn children(&self) -> Arc<Vec<Arc<MavenDependency>>> {
        self.data.read().children.clone()
    }

    pub fn constraints(&self) -> Arc<Vec<Arc<MavenDependencyConstraint>>> {
        self.data.read().constraints.clone()
    }

    pub fn variants(&self) -> Vec<Variant> {
        self.data.read().variants.clone()
    }

    pub fn packaging(&self) -> Option<String> {
        self.data.read().packaging.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    /// Record a diagnostic and mirror it to the log
    pub fn report(&self, message: Message) {
        match message.severity {
            Severity::Info => tracing::info!(dependency = %self.coordinate, "{}", message),
            Severity::Warning => tracing::warn!(dependency = %self.coordinate, "{}", message),
            Severity::Error => tracing::error!(dependency = %self.coordinate, "{}", message),
        }
        self.messages.lock().push(message);
    }

    /// Repository this dependency was first fetched from
    pub fn repository(&self) -> Option<&Repository> {
        self.repository.get()
    }

    pub(crate) fn set_repository(&self, repository: &Repository) {
        let _ = self.repository.set(repository.clone());
    }

    /// Configured repositories, the sticky one first
    pub fn repositories(&self, settings: &Settings) -> Vec<Repository> {
        match self.repository.get() {
            Some(sticky) => std::iter::once(sticky.clone())
                .chain(settings.repositories.iter().filter(|r| *r != sticky).cloned())
                .collect(),
            None => settings.repositories.clone(),
        }
    }

    /// The shared file object for `name`
    pub fn file(&self, name: &str) -> Arc<DependencyFile> {
        self.files
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(DependencyFile::new(self.coordinate.clone(), name, None)))
            .value()
            .clone()
    }

    pub(crate) fn variant_file(&self, file: &crate::metadata::VariantFile) -> Arc<DependencyFile> {
        self.files
            .entry(file.url.clone())
            .or_insert_with(|| {
                Arc::new(DependencyFile::from_variant_file(self.coordinate.clone(), file))
            })
            .value()
            .clone()
    }

    pub fn pom_file(&self) -> Arc<DependencyFile> {
        self.file(&self.coordinate.file_name(None, "pom"))
    }

    pub fn module_file(&self) -> Arc<DependencyFile> {
        self.file(&self.coordinate.file_name(None, "module"))
    }

    /// Bring this dependency at least to `level`
    ///
    /// Concurrent callers serialize on the resolve lock; whoever comes second finds the state
    /// already advanced and returns. The state advances even when resolution ran into
    /// diagnostics, so a broken coordinate is attempted once per level.
    pub async fn resolve_children(
        &self,
        context: &Context,
        level: ResolutionLevel,
    ) -> ResolveResult<()> {
        if self.state() >= level.state() {
            return Ok(());
        }

        let _guard = self.resolve_lock.lock().await;
        if self.state() >= level.state() {
            return Ok(());
        }

        tracing::debug!(dependency = %self.coordinate, ?level, "resolving");
        self.messages.lock().clear();
        let result = self.resolve(context, level).await;
        self.state.fetch_max(level.state() as u8, Ordering::SeqCst);

        match result {
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                self.report(
                    Message::error(format!("Unable to resolve {}", self.coordinate))
                        .with_extra(e.to_string()),
                );
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    async fn resolve(&self, context: &Context, level: ResolutionLevel) -> ResolveResult<()> {
        let settings = &context.settings;

        let pom = self.pom_file();
        let pom_text = if pom.is_downloaded_or_download(self, context, level).await? {
            pom.read_text().await?
        } else {
            if level != ResolutionLevel::Network {
                self.report(
                    Message::warning(format!("Pom was not found for {}", self.coordinate))
                        .with_extra(settings.repositories_description()),
                );
            }
            None
        };

        let publishes_metadata = pom_text
            .as_deref()
            .map_or(true, publishes_gradle_metadata);
        if publishes_metadata {
            let module = self.module_file();
            if module.is_downloaded_or_download(self, context, level).await? {
                return self.resolve_using_metadata(context, level, &module).await;
            }
            if pom_text.is_some() && level != ResolutionLevel::Network {
                self.report(Message::warning(format!(
                    "Pom is resolved, but metadata was not found for {}",
                    self.coordinate
                )));
            }
        }

        match pom_text {
            Some(text) => self.resolve_using_pom(&text, context, level).await,
            None => {
                if level == ResolutionLevel::Network {
                    self.report(
                        Message::error(format!(
                            "Neither pom nor module metadata was found for {}",
                            self.coordinate
                        ))
                        .with_extra(settings.repositories_description()),
                    );
                }
                Ok(())
            }
        }
    }

    /// Parse a downloaded module file, recording a diagnostic when it can not be used
    pub(crate) async fn parse_module_metadata(
        &self,
        module: &DependencyFile,
        level: ResolutionLevel,
    ) -> ResolveResult<Option<ModuleMetadata>> {
        let Some(text) = module.read_text().await? else {
            let message = format!("Module metadata was not downloaded for {}", self.coordinate);
            self.report(if level == ResolutionLevel::Network {
                Message::error(message)
            } else {
                Message::warning(message)
            });
            return Ok(None);
        };
        match ModuleMetadata::parse(&text) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) => {
                self.report(
                    Message::error(format!("Unable to parse metadata file {}", module))
                        .with_extra(e.to_string()),
                );
                Ok(None)
            }
        }
    }

    async fn resolve_using_metadata(
        &self,
        context: &Context,
        level: ResolutionLevel,
        module: &DependencyFile,
    ) -> ResolveResult<()> {
        let Some(metadata) = self.parse_module_metadata(module, level).await? else {
            return Ok(());
        };
        context.settings.validate_platforms()?;

        match context.settings.single_platform() {
            Some(platform) => {
                let selection = select_variants(
                    &metadata.variants,
                    &self.coordinate,
                    context.settings.scope,
                    platform,
                );
                if selection.is_ambiguous() {
                    self.report(
                        Message::warning(format!(
                            "More than a single variant provided for {}",
                            self.coordinate
                        ))
                        .with_extra(selection.names()),
                    );
                }

                let usable: Vec<&Variant> = selection.usable().collect();
                let children = usable
                    .iter()
                    .flat_map(|v| {
                        v.dependencies
                            .iter()
                            .cloned()
                            .chain(v.available_at.iter().map(|a| a.as_dependency()))
                    })
                    .filter_map(|dependency| self.child(context, &dependency))
                    .collect();
                let constraints = usable
                    .iter()
                    .flat_map(|v| v.dependency_constraints.iter())
                    .map(|c| self.constraint(context, c))
                    .collect();

                let mut data = self.data.write();
                data.variants = selection.variants.clone();
                data.children = Arc::new(dedup(children));
                data.constraints = Arc::new(constraints);
                Ok(())
            }
            None => kmp::resolve_multiplatform(self, context, level, &metadata).await,
        }
    }

    /// Bind a module metadata dependency to a concrete coordinate
    pub(crate) fn child(
        &self,
        context: &Context,
        dependency: &ModuleDependency,
    ) -> Option<Arc<MavenDependency>> {
        match dependency.version.resolve() {
            Some(version) => Some(context.cache.dependency(&Coordinate::new(
                &dependency.group,
                &dependency.module,
                version,
            ))),
            None => {
                let text = match dependency.version.unresolved_range() {
                    Some(range) => format!(
                        "Unsupported version range {} of {}:{} required by {}",
                        range, dependency.group, dependency.module, self.coordinate
                    ),
                    None => format!(
                        "No version declared for {}:{} required by {}",
                        dependency.group, dependency.module, self.coordinate
                    ),
                };
                self.report(Message::error(text));
                None
            }
        }
    }

    pub(crate) fn constraint(
        &self,
        context: &Context,
        dependency: &ModuleDependency,
    ) -> Arc<MavenDependencyConstraint> {
        context.cache.constraint(
            Key::new(&dependency.group, &dependency.module),
            dependency.version.clone(),
        )
    }

    #[cfg(test)]
    pub(crate) fn set_resolved_data(&self, data: ResolvedData) {
        *self.data.write() = data;
    }

    pub(crate) fn set_multiplatform_result(
        &self,
        children: Vec<Arc<MavenDependency>>,
        constraints: Vec<Arc<MavenDependencyConstraint>>,
        source_set_files: Vec<Arc<DependencyFile>>,
    ) {
        let mut data = self.data.write();
        data.children = Arc::new(dedup(children));
        data.constraints = Arc::new(constraints);
        data.source_set_files = source_set_files;
    }

    async fn resolve_using_pom(
        &self,
        text: &str,
        context: &Context,
        level: ResolutionLevel,
    ) -> ResolveResult<()> {
        let project = match Project::parse(text) {
            Ok(project) => project,
            Err(e) => {
                self.report(
                    Message::error(format!("Unable to parse pom file {}", self.pom_file()))
                        .with_extra(e.to_string()),
                );
                return Ok(());
            }
        };
        let project = self.resolve_project(project, context, level, 0).await?;

        let scope = context.settings.scope;
        let mut children = Vec::new();
        for dependency in project
            .dependencies
            .iter()
            .filter(|d| scope.matches_pom(d) && !d.optional)
        {
            match dependency.version.as_deref() {
                Some(version) if is_version_range(version) => self.report(Message::error(format!(
                    "Unsupported version range {} of {}:{} required by {}",
                    version, dependency.group_id, dependency.artifact_id, self.coordinate
                ))),
                Some(version) => children.push(context.cache.dependency(&Coordinate::new(
                    &dependency.group_id,
                    &dependency.artifact_id,
                    version,
                ))),
                None => self.report(Message::warning(format!(
                    "No version declared for {}:{} required by {}",
                    dependency.group_id, dependency.artifact_id, self.coordinate
                ))),
            }
        }

        let mut data = self.data.write();
        data.packaging = Some(project.packaging.unwrap_or_else(|| "jar".to_string()));
        data.children = Arc::new(dedup(children));
        Ok(())
    }

    /// Inherit the parent chain, expand imported BOMs and placeholders
    fn resolve_project<'a>(
        &'a self,
        project: Project,
        context: &'a Context,
        level: ResolutionLevel,
        depth: usize,
    ) -> BoxFuture<'a, ResolveResult<Project>> {
        async move {
            if depth > MAX_PARENT_DEPTH {
                self.report(Message::warning(format!(
                    "Project {} has more than ten ancestors",
                    self.coordinate
                )));
                return Ok(project);
            }

            let project = match project.parent.clone() {
                Some(parent) => {
                    let coordinate =
                        Coordinate::new(&parent.group_id, &parent.artifact_id, &parent.version);
                    match self.related_project(&coordinate, context, level).await? {
                        Some(parent_project) => {
                            let parent_project = self
                                .resolve_project(parent_project, context, level, depth + 1)
                                .await?;
                            project.inherit(&parent_project)
                        }
                        None => project.inherit_identity(),
                    }
                }
                None => project,
            };

            let mut project = project.expand_templates();
            let mut managed = Vec::new();
            for entry in std::mem::take(&mut project.dependency_management) {
                if let (true, Some(version)) = (entry.is_import(), entry.version.as_deref()) {
                    let coordinate = Coordinate::new(&entry.group_id, &entry.artifact_id, version);
                    if let Some(bom) = self.related_project(&coordinate, context, level).await? {
                        let bom = self.resolve_project(bom, context, level, depth + 1).await?;
                        managed.extend(bom.dependency_management);
                        continue;
                    }
                }
                managed.push(entry);
            }
            project.dependency_management = managed;

            Ok(project.apply_dependency_management().expand_templates())
        }
        .boxed()
    }

    /// Parse the POM of a parent or BOM coordinate. Its download problems are recorded on
    /// that coordinate's own dependency.
    async fn related_project(
        &self,
        coordinate: &Coordinate,
        context: &Context,
        level: ResolutionLevel,
    ) -> ResolveResult<Option<Project>> {
        let related = context.cache.dependency(coordinate);
        let pom = related.pom_file();
        if !pom.is_downloaded_or_download(&related, context, level).await? {
            self.report(Message::warning(format!(
                "Pom {} referenced by {} was not found",
                coordinate, self.coordinate
            )));
            return Ok(None);
        }
        match pom.read_text().await? {
            Some(text) => Ok(Some(Project::parse(&text)?)),
            None => Ok(None),
        }
    }

    /// Files to download for this dependency
    ///
    /// Variant files (documentation variants only with sources), the packaged artifact for
    /// POM-based resolution and repackaged source-set libraries.
    pub fn files(&self, with_sources: bool) -> Vec<Arc<DependencyFile>> {
        let data = self.data.read().clone();
        let mut files = Vec::new();

        for variant in data
            .variants
            .iter()
            .filter(|v| with_sources || !v.is_documentation_or_metadata())
        {
            files.extend(variant.files.iter().map(|f| self.variant_file(f)));
        }

        if let Some(extension) = data.packaging.as_deref().and_then(artifact_extension) {
            files.push(self.file(&self.coordinate.file_name(None, extension)));
            if with_sources && extension == "jar" {
                files.push(self.file(&self.coordinate.file_name(Some("sources"), "jar")));
            }
        }

        files.extend(data.source_set_files.iter().cloned());

        if !with_sources {
            files.retain(|f| !f.is_sources_or_javadoc());
        }
        files
    }

    /// Download every file of [`files`](Self::files) not available locally yet
    ///
    /// Multiplatform resolutions produce their files while resolving, so there is nothing
    /// left to download for them.
    pub async fn download_dependencies(
        &self,
        context: &Context,
        level: ResolutionLevel,
        with_sources: bool,
    ) -> ResolveResult<()> {
        if context.settings.is_multiplatform() {
            return Ok(());
        }
        for file in self.files(with_sources) {
            let available = file
                .is_downloaded_or_download(self, context, level)
                .await;
            match available {
                Ok(true) => {}
                Ok(false) if file.is_sources_or_javadoc() => self.report(Message::warning(
                    format!("Sources were not found: {}", file.name()),
                )),
                Ok(false) if level < ResolutionLevel::Network => self.report(Message::error(
                    format!("File was not found in the local cache: {}", file.name()),
                )),
                Ok(false) => self.report(
                    Message::error(format!("Unable to download file {}", file.name()))
                        .with_extra(context.settings.repositories_description()),
                ),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => self.report(
                    Message::error(format!("Unable to download file {}", file.name()))
                        .with_extra(e.to_string()),
                ),
            }
        }
        Ok(())
    }
}

/// Extension of the main artifact for a POM `packaging`, `None` for POM-only modules
fn artifact_extension(packaging: &str) -> Option<&str> {
    match packaging {
        "pom" => None,
        "bundle" | "maven-plugin" | "ejb" => Some("jar"),
        other => Some(other),
    }
}

fn dedup(children: Vec<Arc<MavenDependency>>) -> Vec<Arc<MavenDependency>> {
    let mut unique: Vec<Arc<MavenDependency>> = Vec::with_capacity(children.len());
    for child in children {
        if !unique.iter().any(|c| Arc::ptr_eq(c, &child)) {
            unique.push(child);
        }
    }
    unique
}

impl fmt::Display for MavenDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.coordinate)
    }
}

impl fmt::Debug for MavenDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MavenDependency")
            .field("coordinate", &self.coordinate)
            .field("state", &self.state())
            .field("repository", &self.repository.get())
            .finish()
    }
}

/// A version constraint declared by module metadata. Constraints have no children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MavenDependencyConstraint {
    pub key: Key,
    pub version: VersionRequirement,
}

impl MavenDependencyConstraint {
    pub fn new(key: Key, version: VersionRequirement) -> Self {
        Self { key, version }
    }

    fn version_text(&self) -> &str {
        self.version
            .resolve()
            .or_else(|| self.version.unresolved_range())
            .unwrap_or("")
    }
}

impl fmt::Display for MavenDependencyConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "constraint:{}:{}", self.key, self.version_text())
    }
}
