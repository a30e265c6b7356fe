//! Hierarchy resolution
//!
//! Turns a partially specified (space, scene set, scene) triple into a fully
//! specified one with the fewest lookups and creations. The presence of the
//! three ids forms a 3-bit key selecting one of eight strategies:
//!
//! | key | space | set | scene | strategy |
//! |-----|-------|-----|-------|----------|
//! | 000 | -     | -   | -     | create space, set, scene |
//! | 001 | -     | -   | x     | get scene: space + set |
//! | 010 | -     | x   | -     | get set: space; create scene |
//! | 011 | -     | x   | x     | get scene: space |
//! | 100 | x     | -   | -     | create set, scene |
//! | 101 | x     | -   | x     | get scene: set |
//! | 110 | x     | x   | -     | create scene |
//! | 111 | x     | x   | x     | nothing |

use crate::config::NamingSettings;
use crate::context::ApplyContext;
use crate::error::{PlatformError, SceneGenError};
use crate::platform::{CreateScene, CreateSceneSet, CreateSpace, SceneInfo, SceneSetInfo, SceneStore};
use crate::types::{Requirement, ResolvedHierarchy, SceneStepRequest, TargetHierarchy};
use std::fmt;
use std::sync::Arc;

/// One of the eight resolution policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionStrategy {
    /// Nothing known: create space, scene set and scene
    CreateAll,
    /// Only scene known: inherit space and set from the scene
    InheritFromScene,
    /// Only set known: inherit space from the set, create scene
    CreateSceneInSet,
    /// Set and scene known: inherit space from the scene
    SpaceFromScene,
    /// Only space known: create scene set and scene
    CreateSetAndScene,
    /// Space and scene known: inherit set from the scene
    SetFromScene,
    /// Space and set known: create scene
    CreateScene,
    /// Everything known
    FullySpecified,
}

/// External call a strategy performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlannedCall {
    /// `create_space`
    CreateSpace,
    /// `create_scene_set`
    CreateSceneSet,
    /// `create_scene`
    CreateScene,
    /// `get_scene`
    GetScene,
    /// `get_scene_set`
    GetSceneSet,
}

impl fmt::Display for PlannedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateSpace => "create space",
            Self::CreateSceneSet => "create scene set",
            Self::CreateScene => "create scene",
            Self::GetScene => "get scene",
            Self::GetSceneSet => "get scene set",
        };
        f.write_str(name)
    }
}

impl ResolutionStrategy {
    /// Strategies indexed by presence key
    pub const TABLE: [Self; 8] = [
        Self::CreateAll,
        Self::InheritFromScene,
        Self::CreateSceneInSet,
        Self::SpaceFromScene,
        Self::CreateSetAndScene,
        Self::SetFromScene,
        Self::CreateScene,
        Self::FullySpecified,
    ];

    /// Strategy for the given coordinates
    #[inline]
    #[must_use]
    pub fn for_target(target: &TargetHierarchy) -> Self {
        Self::TABLE[usize::from(target.presence_key())]
    }

    /// Calls issued, in order
    #[must_use]
    pub fn planned_calls(self) -> &'static [PlannedCall] {
        use PlannedCall::{CreateScene, CreateSceneSet, CreateSpace, GetScene, GetSceneSet};
        match self {
            Self::CreateAll => &[CreateSpace, CreateSceneSet, CreateScene],
            Self::InheritFromScene | Self::SpaceFromScene | Self::SetFromScene => &[GetScene],
            Self::CreateSceneInSet => &[GetSceneSet, CreateScene],
            Self::CreateSetAndScene => &[CreateSceneSet, CreateScene],
            Self::CreateScene => &[CreateScene],
            Self::FullySpecified => &[],
        }
    }

    /// Whether anything gets created
    #[inline]
    #[must_use]
    pub fn creates(self) -> bool {
        self.planned_calls().iter().any(|c| {
            matches!(
                c,
                PlannedCall::CreateSpace | PlannedCall::CreateSceneSet | PlannedCall::CreateScene
            )
        })
    }
}

/// Resolves requirement hierarchies against a [`SceneStore`]
#[derive(Clone)]
pub struct HierarchyResolver {
    store: Arc<dyn SceneStore>,
    naming: NamingSettings,
}

impl fmt::Debug for HierarchyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HierarchyResolver")
            .field("naming", &self.naming)
            .finish_non_exhaustive()
    }
}

impl HierarchyResolver {
    /// Create resolver
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn SceneStore>, naming: NamingSettings) -> Self {
        Self { store, naming }
    }

    /// Resolve `requirement.target` in place
    ///
    /// # Arguments
    /// * `ctx` - Batch context (project, acting user, cancellation)
    /// * `index` - Requirement position, used in errors
    /// * `requirement` - Requirement whose target gets filled
    ///
    /// # Errors
    /// - `SceneGenError::Resolution` naming the failing operation
    /// - `SceneGenError::Cancelled` if the batch was cancelled
    pub async fn resolve(
        &self,
        ctx: &ApplyContext,
        index: usize,
        requirement: &mut Requirement,
    ) -> Result<ResolvedHierarchy, SceneGenError> {
        if ctx.is_cancelled() {
            return Err(SceneGenError::Cancelled);
        }
        let strategy = ResolutionStrategy::for_target(&requirement.target);
        let asset_id = requirement.apis.asset_id.clone();
        let target = &mut requirement.target;
        let mut resolved = ResolvedHierarchy::default();

        tracing::debug!(
            "requirements[{}]: resolving {:?} with {:?}",
            index,
            target,
            strategy
        );

        match strategy {
            ResolutionStrategy::CreateAll => {
                let (space_id, name) = self.create_space(ctx, index, &asset_id).await?;
                target.space_id = space_id;
                resolved.space_name = name;

                let (set_id, name) =
                    self.create_scene_set(ctx, index, &asset_id, target.space_id).await?;
                target.scene_set_id = set_id;
                resolved.scene_set_name = name;

                let (scene_id, name) = self
                    .create_scene(ctx, index, &asset_id, target.space_id, target.scene_set_id)
                    .await?;
                target.scene_id = scene_id;
                resolved.scene_name = name;
            }
            ResolutionStrategy::InheritFromScene => {
                let scene = self.lookup_scene(ctx, index, target.scene_id).await?;
                target.space_id = scene.space_id;
                target.scene_set_id = scene.scene_set_id;
            }
            ResolutionStrategy::CreateSceneInSet => {
                let set = self.lookup_scene_set(ctx, index, target.scene_set_id).await?;
                target.space_id = set.space_id;

                let (scene_id, name) = self
                    .create_scene(ctx, index, &asset_id, target.space_id, target.scene_set_id)
                    .await?;
                target.scene_id = scene_id;
                resolved.scene_name = name;
            }
            ResolutionStrategy::SpaceFromScene => {
                let scene = self.lookup_scene(ctx, index, target.scene_id).await?;
                if scene.scene_set_id != target.scene_set_id {
                    return Err(mismatch(
                        index,
                        target.scene_id,
                        "scene set",
                        scene.scene_set_id,
                        target.scene_set_id,
                    ));
                }
                target.space_id = scene.space_id;
            }
            ResolutionStrategy::CreateSetAndScene => {
                let (set_id, name) =
                    self.create_scene_set(ctx, index, &asset_id, target.space_id).await?;
                target.scene_set_id = set_id;
                resolved.scene_set_name = name;

                let (scene_id, name) = self
                    .create_scene(ctx, index, &asset_id, target.space_id, target.scene_set_id)
                    .await?;
                target.scene_id = scene_id;
                resolved.scene_name = name;
            }
            ResolutionStrategy::SetFromScene => {
                let scene = self.lookup_scene(ctx, index, target.scene_id).await?;
                if scene.space_id != target.space_id {
                    return Err(mismatch(
                        index,
                        target.scene_id,
                        "space",
                        scene.space_id,
                        target.space_id,
                    ));
                }
                target.scene_set_id = scene.scene_set_id;
            }
            ResolutionStrategy::CreateScene => {
                let (scene_id, name) = self
                    .create_scene(ctx, index, &asset_id, target.space_id, target.scene_set_id)
                    .await?;
                target.scene_id = scene_id;
                resolved.scene_name = name;
            }
            ResolutionStrategy::FullySpecified => {}
        }

        if !target.is_fully_specified() {
            return Err(SceneGenError::Resolution {
                index,
                operation: "resolve autotest scene hierarchy",
                source: PlatformError::Rejected(format!("incomplete hierarchy {target:?}")),
            });
        }

        resolved.ids = *target;
        Ok(resolved)
    }

    /// Locate the scene an adjusted step was approved for
    ///
    /// The adjusted request is authoritative: nothing is created, the scene is
    /// looked up to recover its scene set. Any coordinate the requirement
    /// gives explicitly must agree with the request.
    ///
    /// # Errors
    /// - `SceneGenError::Resolution` if the scene is unknown or ids disagree
    /// - `SceneGenError::Cancelled` if the batch was cancelled
    pub async fn locate_adjusted(
        &self,
        ctx: &ApplyContext,
        index: usize,
        target: &TargetHierarchy,
        adjusted: &SceneStepRequest,
    ) -> Result<ResolvedHierarchy, SceneGenError> {
        const OP: &str = "get autotest scene by ID";
        if ctx.is_cancelled() {
            return Err(SceneGenError::Cancelled);
        }
        if adjusted.scene_id == 0 {
            return Err(resolution(
                index,
                OP,
                PlatformError::Rejected("adjusted step has no scene id".to_string()),
            ));
        }

        let scene = self.lookup_scene(ctx, index, adjusted.scene_id).await?;
        if adjusted.space_id > 0 && adjusted.space_id != scene.space_id {
            return Err(mismatch(
                index,
                adjusted.scene_id,
                "space",
                scene.space_id,
                adjusted.space_id,
            ));
        }
        let ids = TargetHierarchy::new(scene.space_id, scene.scene_set_id, adjusted.scene_id);

        let conflicts = [
            (target.space_id, ids.space_id),
            (target.scene_set_id, ids.scene_set_id),
            (target.scene_id, ids.scene_id),
        ]
        .iter()
        .any(|&(given, actual)| given > 0 && given != actual);
        if conflicts {
            return Err(resolution(
                index,
                OP,
                PlatformError::Rejected(format!(
                    "adjusted step is located at {ids:?}, requirement targets {target:?}"
                )),
            ));
        }
        if !ids.is_fully_specified() {
            return Err(resolution(
                index,
                "resolve autotest scene hierarchy",
                PlatformError::Rejected(format!("incomplete hierarchy {ids:?}")),
            ));
        }

        tracing::debug!("requirements[{}]: adjusted step located at {:?}", index, ids);
        Ok(ResolvedHierarchy {
            ids,
            ..ResolvedHierarchy::default()
        })
    }

    async fn create_space(
        &self,
        ctx: &ApplyContext,
        index: usize,
        asset_id: &str,
    ) -> Result<(u64, String), SceneGenError> {
        const OP: &str = "create autotest space";
        let request = CreateSpace {
            name: self.naming.space_name(asset_id),
            project_id: ctx.project_id,
            description: self.naming.space_description.clone(),
            user_id: ctx.user_id.clone(),
        };
        let id = ctx
            .guard(self.store.create_space(&request))
            .await?
            .and_then(positive)
            .map_err(|source| resolution(index, OP, source))?;
        tracing::info!("requirements[{}]: created space {} ({})", index, request.name, id);
        Ok((id, request.name))
    }

    async fn create_scene_set(
        &self,
        ctx: &ApplyContext,
        index: usize,
        asset_id: &str,
        space_id: u64,
    ) -> Result<(u64, String), SceneGenError> {
        const OP: &str = "create autotest scene set";
        let request = CreateSceneSet {
            name: self.naming.scene_set_name(asset_id),
            description: self.naming.scene_set_description.clone(),
            space_id,
            project_id: ctx.project_id,
            user_id: ctx.user_id.clone(),
        };
        let id = ctx
            .guard(self.store.create_scene_set(&request))
            .await?
            .and_then(positive)
            .map_err(|source| resolution(index, OP, source))?;
        tracing::info!("requirements[{}]: created scene set {} ({})", index, request.name, id);
        Ok((id, request.name))
    }

    async fn create_scene(
        &self,
        ctx: &ApplyContext,
        index: usize,
        asset_id: &str,
        space_id: u64,
        scene_set_id: u64,
    ) -> Result<(u64, String), SceneGenError> {
        const OP: &str = "create autotest scene";
        let request = CreateScene {
            name: self.naming.scene_name(asset_id),
            description: self.naming.scene_description.clone(),
            space_id,
            scene_set_id,
            user_id: ctx.user_id.clone(),
        };
        let id = ctx
            .guard(self.store.create_scene(&request))
            .await?
            .and_then(positive)
            .map_err(|source| resolution(index, OP, source))?;
        tracing::info!("requirements[{}]: created scene {} ({})", index, request.name, id);
        Ok((id, request.name))
    }

    async fn lookup_scene(
        &self,
        ctx: &ApplyContext,
        index: usize,
        scene_id: u64,
    ) -> Result<SceneInfo, SceneGenError> {
        ctx.guard(self.store.get_scene(scene_id, &ctx.user_id))
            .await?
            .map_err(|source| resolution(index, "get autotest scene by ID", source))
    }

    async fn lookup_scene_set(
        &self,
        ctx: &ApplyContext,
        index: usize,
        scene_set_id: u64,
    ) -> Result<SceneSetInfo, SceneGenError> {
        ctx.guard(self.store.get_scene_set(scene_set_id, &ctx.user_id))
            .await?
            .map_err(|source| resolution(index, "get autotest scene set by ID", source))
    }
}

fn positive(id: u64) -> Result<u64, PlatformError> {
    if id == 0 {
        Err(PlatformError::Rejected("platform returned id 0".to_string()))
    } else {
        Ok(id)
    }
}

/// Given parent id disagrees with the parent the scene actually belongs to
fn mismatch(index: usize, scene_id: u64, parent: &str, actual: u64, given: u64) -> SceneGenError {
    resolution(
        index,
        "get autotest scene by ID",
        PlatformError::Rejected(format!(
            "scene {scene_id} belongs to {parent} {actual}, not {given}"
        )),
    )
}

fn resolution(index: usize, operation: &'static str, source: PlatformError) -> SceneGenError {
    SceneGenError::Resolution {
        index,
        operation,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MockSceneStore;
    use proptest::prelude::*;

    fn ctx() -> ApplyContext {
        ApplyContext::new(1, 77, "u-1")
    }

    fn resolver(store: MockSceneStore) -> HierarchyResolver {
        HierarchyResolver::new(Arc::new(store), NamingSettings::default())
    }

    fn requirement(space: u64, set: u64, scene: u64) -> Requirement {
        Requirement::new("pets").with_target(TargetHierarchy::new(space, set, scene))
    }

    #[test]
    fn table_matches_presence_key() {
        for key in 0u8..8 {
            let target = TargetHierarchy::new(
                u64::from(key & 0b100 != 0),
                u64::from(key & 0b010 != 0),
                u64::from(key & 0b001 != 0),
            );
            assert_eq!(target.presence_key(), key);
            assert_eq!(
                ResolutionStrategy::for_target(&target),
                ResolutionStrategy::TABLE[usize::from(key)]
            );
        }
    }

    #[test]
    fn lookups_never_create() {
        for strategy in [
            ResolutionStrategy::InheritFromScene,
            ResolutionStrategy::SpaceFromScene,
            ResolutionStrategy::SetFromScene,
            ResolutionStrategy::FullySpecified,
        ] {
            assert!(!strategy.creates(), "{strategy:?} must not create");
        }
        assert!(ResolutionStrategy::CreateSceneInSet.creates());
    }

    #[tokio::test]
    async fn nothing_known_creates_all_three() {
        let mut store = MockSceneStore::new();
        store
            .expect_create_space()
            .withf(|r| r.name == "AI_Generated_Space_pets" && r.project_id == 77)
            .times(1)
            .returning(|_| Ok(10));
        store
            .expect_create_scene_set()
            .withf(|r| r.name == "AI_Generated_SceneSet_pets" && r.space_id == 10)
            .times(1)
            .returning(|_| Ok(20));
        store
            .expect_create_scene()
            .withf(|r| r.name == "AI_Generated_Scene_pets" && r.space_id == 10 && r.scene_set_id == 20)
            .times(1)
            .returning(|_| Ok(30));

        let mut req = requirement(0, 0, 0);
        let resolved = resolver(store).resolve(&ctx(), 0, &mut req).await.unwrap();

        assert_eq!(req.target, TargetHierarchy::new(10, 20, 30));
        assert_eq!(resolved.ids, req.target);
        assert_eq!(resolved.space_name, "AI_Generated_Space_pets");
        assert_eq!(resolved.scene_set_name, "AI_Generated_SceneSet_pets");
        assert_eq!(resolved.scene_name, "AI_Generated_Scene_pets");
    }

    #[tokio::test]
    async fn scene_only_inherits_space_and_set() {
        let mut store = MockSceneStore::new();
        store
            .expect_get_scene()
            .withf(|id, user| *id == 30 && user == "u-1")
            .times(1)
            .returning(|_, _| {
                Ok(SceneInfo {
                    space_id: 10,
                    scene_set_id: 20,
                })
            });

        let mut req = requirement(0, 0, 30);
        let resolved = resolver(store).resolve(&ctx(), 0, &mut req).await.unwrap();
        assert_eq!(req.target, TargetHierarchy::new(10, 20, 30));
        assert!(resolved.scene_name.is_empty());
    }

    #[tokio::test]
    async fn set_only_looks_up_space_and_creates_scene() {
        let mut store = MockSceneStore::new();
        store
            .expect_get_scene_set()
            .withf(|id, _| *id == 20)
            .times(1)
            .returning(|_, _| Ok(SceneSetInfo { space_id: 10 }));
        store
            .expect_create_scene()
            .withf(|r| r.space_id == 10 && r.scene_set_id == 20)
            .times(1)
            .returning(|_| Ok(30));

        let mut req = requirement(0, 20, 0);
        let resolved = resolver(store).resolve(&ctx(), 0, &mut req).await.unwrap();
        assert_eq!(req.target, TargetHierarchy::new(10, 20, 30));
        assert_eq!(resolved.scene_name, "AI_Generated_Scene_pets");
        assert!(resolved.space_name.is_empty());
    }

    #[tokio::test]
    async fn set_and_scene_inherit_space_from_scene() {
        let mut store = MockSceneStore::new();
        store.expect_get_scene().times(1).returning(|_, _| {
            Ok(SceneInfo {
                space_id: 10,
                scene_set_id: 20,
            })
        });

        let mut req = requirement(0, 20, 30);
        resolver(store).resolve(&ctx(), 0, &mut req).await.unwrap();
        assert_eq!(req.target, TargetHierarchy::new(10, 20, 30));
    }

    #[tokio::test]
    async fn scene_outside_given_set_is_rejected() {
        let mut store = MockSceneStore::new();
        store.expect_get_scene().times(1).returning(|_, _| {
            Ok(SceneInfo {
                space_id: 10,
                scene_set_id: 99,
            })
        });

        let mut req = requirement(0, 20, 30);
        let err = resolver(store).resolve(&ctx(), 2, &mut req).await.unwrap_err();

        match err {
            SceneGenError::Resolution {
                index,
                operation,
                source: PlatformError::Rejected(msg),
            } => {
                assert_eq!(index, 2);
                assert_eq!(operation, "get autotest scene by ID");
                assert!(msg.contains("scene set 99"), "{msg}");
            }
            other => panic!("expected Resolution, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn scene_outside_given_space_is_rejected() {
        let mut store = MockSceneStore::new();
        store.expect_get_scene().times(1).returning(|_, _| {
            Ok(SceneInfo {
                space_id: 11,
                scene_set_id: 20,
            })
        });

        let mut req = requirement(10, 0, 30);
        let err = resolver(store).resolve(&ctx(), 0, &mut req).await.unwrap_err();

        assert!(matches!(
            err,
            SceneGenError::Resolution { operation: "get autotest scene by ID", .. }
        ));
        assert!(err.to_string().contains("belongs to space 11, not 10"));
    }

    #[tokio::test]
    async fn adjusted_step_is_located_without_creating() {
        let mut store = MockSceneStore::new();
        store
            .expect_get_scene()
            .withf(|id, _| *id == 30)
            .times(1)
            .returning(|_, _| {
                Ok(SceneInfo {
                    space_id: 10,
                    scene_set_id: 20,
                })
            });
        // no create expectations: any creation would panic
        let adjusted = SceneStepRequest {
            space_id: 10,
            scene_id: 30,
            ..SceneStepRequest::default()
        };

        let resolved = resolver(store)
            .locate_adjusted(&ctx(), 0, &TargetHierarchy::default(), &adjusted)
            .await
            .unwrap();

        assert_eq!(resolved.ids, TargetHierarchy::new(10, 20, 30));
        assert!(resolved.space_name.is_empty());
        assert!(resolved.scene_set_name.is_empty());
        assert!(resolved.scene_name.is_empty());
    }

    #[tokio::test]
    async fn adjusted_step_conflicting_with_target_is_rejected() {
        let mut store = MockSceneStore::new();
        store.expect_get_scene().times(1).returning(|_, _| {
            Ok(SceneInfo {
                space_id: 10,
                scene_set_id: 20,
            })
        });
        let adjusted = SceneStepRequest {
            space_id: 10,
            scene_id: 30,
            ..SceneStepRequest::default()
        };

        let err = resolver(store)
            .locate_adjusted(&ctx(), 1, &TargetHierarchy::new(0, 21, 0), &adjusted)
            .await
            .unwrap_err();

        assert!(matches!(err, SceneGenError::Resolution { index: 1, .. }));
        assert!(err.to_string().contains("adjusted step is located at"));
    }

    #[tokio::test]
    async fn adjusted_step_with_wrong_space_is_rejected() {
        let mut store = MockSceneStore::new();
        store.expect_get_scene().times(1).returning(|_, _| {
            Ok(SceneInfo {
                space_id: 10,
                scene_set_id: 20,
            })
        });
        let adjusted = SceneStepRequest {
            space_id: 11,
            scene_id: 30,
            ..SceneStepRequest::default()
        };

        let err = resolver(store)
            .locate_adjusted(&ctx(), 0, &TargetHierarchy::default(), &adjusted)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("belongs to space 10, not 11"));
    }

    #[tokio::test]
    async fn adjusted_step_without_scene_makes_no_call() {
        let err = resolver(MockSceneStore::new())
            .locate_adjusted(&ctx(), 0, &TargetHierarchy::default(), &SceneStepRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SceneGenError::Resolution { operation: "get autotest scene by ID", .. }));
    }

    #[tokio::test]
    async fn space_only_creates_set_and_scene() {
        let mut store = MockSceneStore::new();
        store
            .expect_create_scene_set()
            .withf(|r| r.space_id == 10 && r.project_id == 77)
            .times(1)
            .returning(|_| Ok(20));
        store
            .expect_create_scene()
            .withf(|r| r.space_id == 10 && r.scene_set_id == 20)
            .times(1)
            .returning(|_| Ok(30));

        let mut req = requirement(10, 0, 0);
        let resolved = resolver(store).resolve(&ctx(), 0, &mut req).await.unwrap();
        assert_eq!(req.target, TargetHierarchy::new(10, 20, 30));
        assert!(resolved.space_name.is_empty());
        assert_eq!(resolved.scene_set_name, "AI_Generated_SceneSet_pets");
    }

    #[tokio::test]
    async fn space_and_scene_inherit_set() {
        let mut store = MockSceneStore::new();
        store.expect_get_scene().times(1).returning(|_, _| {
            Ok(SceneInfo {
                space_id: 10,
                scene_set_id: 20,
            })
        });

        let mut req = requirement(10, 0, 30);
        resolver(store).resolve(&ctx(), 0, &mut req).await.unwrap();
        assert_eq!(req.target, TargetHierarchy::new(10, 20, 30));
    }

    #[tokio::test]
    async fn space_and_set_create_scene() {
        let mut store = MockSceneStore::new();
        store
            .expect_create_scene()
            .withf(|r| r.space_id == 10 && r.scene_set_id == 20 && r.user_id == "u-1")
            .times(1)
            .returning(|_| Ok(30));

        let mut req = requirement(10, 20, 0);
        resolver(store).resolve(&ctx(), 0, &mut req).await.unwrap();
        assert_eq!(req.target, TargetHierarchy::new(10, 20, 30));
    }

    #[tokio::test]
    async fn failure_names_operation_and_index() {
        let mut store = MockSceneStore::new();
        store
            .expect_create_space()
            .times(1)
            .returning(|_| Ok(10));
        store
            .expect_create_scene_set()
            .times(1)
            .returning(|_| Err(PlatformError::Unavailable("db down".into())));

        let mut req = requirement(0, 0, 0);
        let err = resolver(store).resolve(&ctx(), 4, &mut req).await.unwrap_err();

        match err {
            SceneGenError::Resolution {
                index, operation, ..
            } => {
                assert_eq!(index, 4);
                assert_eq!(operation, "create autotest scene set");
            }
            other => panic!("expected Resolution, got {other:?}"),
        }
        // what was created before the failure stays visible
        assert_eq!(req.target.space_id, 10);
    }

    #[tokio::test]
    async fn zero_id_from_platform_is_rejected() {
        let mut store = MockSceneStore::new();
        store.expect_create_scene().times(1).returning(|_| Ok(0));

        let mut req = requirement(10, 20, 0);
        let err = resolver(store).resolve(&ctx(), 0, &mut req).await.unwrap_err();
        assert!(matches!(err, SceneGenError::Resolution { .. }));
    }

    #[tokio::test]
    async fn cancelled_batch_issues_no_calls() {
        let store = MockSceneStore::new();
        let ctx = ctx();
        ctx.cancel();

        let mut req = requirement(0, 0, 0);
        let err = resolver(store).resolve(&ctx, 0, &mut req).await.unwrap_err();
        assert!(matches!(err, SceneGenError::Cancelled));
        assert_eq!(req.target, TargetHierarchy::default());
    }

    proptest! {
        #[test]
        fn fully_specified_is_a_pure_noop(space in 1u64.., set in 1u64.., scene in 1u64..) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            // no expectations: any call panics
            let resolver = resolver(MockSceneStore::new());
            let mut req = requirement(space, set, scene);

            let resolved = runtime
                .block_on(resolver.resolve(&ctx(), 0, &mut req))
                .unwrap();

            prop_assert_eq!(req.target, TargetHierarchy::new(space, set, scene));
            prop_assert_eq!(resolved.ids, req.target);
        }
    }
}
