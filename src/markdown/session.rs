//! Editor session: canonical markdown plus the mounted view
//!
//! The session owns the canonical markdown string of one document, the single
//! mounted view that may write to it, and the change callback through which
//! every edit is published. Mounting is two-phase: [`EditorSession::mount`]
//! hands out a [`PendingInit`] ticket and [`EditorSession::finish_init`]
//! performs the one-shot tree build, but only if the view that asked for it
//! is still the mounted one.

use log::{debug, info, warn};

use crate::config::{Settings, ViewMode};
use crate::error::{Error, Result};
use crate::markdown::brackets::{self, KeyOutcome, RawBuffer, Selection};
use crate::markdown::sync::{ContentSync, ViewInstance, ViewKey};
use crate::markdown::table_edit::insert_table_at_cursor;
use crate::markdown::transformer::{BlockTransformer, ComrakTransformer};
use crate::markdown::tree::{DocumentTree, NodeKey};

/// Callback invoked with the new canonical markdown after each edit.
pub type ChangeCallback = Box<dyn FnMut(&str)>;

/// Ticket for a mounted view that still waits for its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a mounted view stays empty until `finish_init` is called"]
pub struct PendingInit {
    key: ViewKey,
    generation: u64,
}

impl PendingInit {
    pub fn key(&self) -> ViewKey {
        self.key
    }
}

/// One open document and the view currently editing it.
pub struct EditorSession<T: BlockTransformer = ComrakTransformer> {
    sync: ContentSync<T>,
    settings: Settings,
    canonical: String,
    modified: bool,
    on_change: Option<ChangeCallback>,
    view: Option<ViewInstance>,
    next_generation: u64,
}

impl EditorSession<ComrakTransformer> {
    /// Session over the comrak transformer configured from `settings`.
    pub fn new(settings: Settings) -> Self {
        let sync = ContentSync::with_options(settings.markdown.clone());
        Self::with_sync(settings, sync)
    }
}

impl<T: BlockTransformer> EditorSession<T> {
    pub fn with_sync(settings: Settings, sync: ContentSync<T>) -> Self {
        Self {
            sync,
            settings,
            canonical: String::new(),
            modified: false,
            on_change: None,
            view: None,
            next_generation: 0,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Document State
    // ─────────────────────────────────────────────────────────────────────────

    /// Register the callback that receives every published edit.
    pub fn set_on_change<F>(&mut self, callback: F)
    where
        F: FnMut(&str) + 'static,
    {
        self.on_change = Some(Box::new(callback));
    }

    /// Replace the document content, e.g. after opening a file.
    ///
    /// Any mounted view is dropped: it was built from the old content. The
    /// change callback is not invoked and the document is clean afterwards.
    pub fn load_content(&mut self, content: impl Into<String>) {
        if let Some(view) = self.view.take() {
            debug!("Dropping view for tab {} on content load", view.key().tab_id);
        }
        self.canonical = content.into();
        self.modified = false;
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Whether an edit changed the content since load or the last save.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn sync(&self) -> &ContentSync<T> {
        &self.sync
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mount Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Mount a fresh, uninitialized view, replacing any mounted one.
    pub fn mount(&mut self, tab_id: u64, mode: ViewMode) -> PendingInit {
        let key = ViewKey { tab_id, mode };
        let generation = self.next_generation;
        self.next_generation += 1;

        if let Some(old) = self.view.replace(ViewInstance::new(key, generation)) {
            debug!(
                "Replacing {} view of tab {}",
                old.mode().label(),
                old.key().tab_id
            );
        }
        debug!("Mounted {} view for tab {}", mode.label(), tab_id);
        PendingInit { key, generation }
    }

    /// Deliver the one-shot initialization for `pending`.
    ///
    /// Returns `Ok(false)` when the requesting view has been unmounted or
    /// replaced in the meantime; its tree is never built. The change callback
    /// is not invoked: loading a document does not modify it.
    pub fn finish_init(&mut self, pending: PendingInit) -> Result<bool> {
        let view = match self.view.as_mut() {
            Some(view) if view.generation() == pending.generation && view.key() == pending.key => {
                view
            }
            _ => {
                warn!(
                    "Dropping stale initialization for {} view of tab {}",
                    pending.key.mode.label(),
                    pending.key.tab_id
                );
                return Ok(false);
            }
        };
        view.initialize(&self.sync, &self.canonical)?;
        Ok(true)
    }

    /// Mount a view of `tab_id` in the configured [`Settings::view_mode`].
    pub fn mount_default(&mut self, tab_id: u64) -> PendingInit {
        let mode = self.settings.view_mode;
        self.mount(tab_id, mode)
    }

    /// Mount and initialize in one step.
    pub fn mount_and_initialize(&mut self, tab_id: u64, mode: ViewMode) -> Result<()> {
        let pending = self.mount(tab_id, mode);
        self.finish_init(pending).map(|_| ())
    }

    /// Drop the mounted view and its tree.
    pub fn unmount(&mut self) -> Option<ViewKey> {
        let key = self.view.take().map(|view| view.key());
        if let Some(key) = key {
            debug!("Unmounted {} view for tab {}", key.mode.label(), key.tab_id);
        }
        key
    }

    /// Switch the mounted tab to the other view mode.
    ///
    /// The new view is built from the canonical string, which already holds
    /// every edit made through the old one.
    pub fn toggle_view(&mut self) -> Result<ViewMode> {
        let key = self.view.as_ref().ok_or(Error::NoMountedView)?.key();
        let mode = key.mode.toggle();
        self.unmount();
        self.mount_and_initialize(key.tab_id, mode)?;
        info!("Switched tab {} to {} view", key.tab_id, mode.label());
        Ok(mode)
    }

    pub fn mounted(&self) -> Option<&ViewInstance> {
        self.view.as_ref()
    }

    /// The mounted view's tree.
    pub fn tree(&self) -> Result<&DocumentTree> {
        self.view.as_ref().ok_or(Error::NoMountedView)?.tree()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Edits
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply a structural edit to the rendered view's tree and publish it.
    ///
    /// `edit` works on a copy. If it fails, or leaves the tables malformed,
    /// neither the tree nor the canonical string changes.
    pub fn edit_tree<R, F>(&mut self, edit: F) -> Result<R>
    where
        F: FnOnce(&mut DocumentTree) -> Result<R>,
    {
        let view = self.view.as_mut().ok_or(Error::NoMountedView)?;
        if view.mode() != ViewMode::Rendered {
            return Err(Error::WrongViewMode);
        }
        let tree = view.tree_mut()?;

        let mut working = tree.clone();
        let result = edit(&mut working)?;
        working.validate()?;
        let markdown = self.sync.serialize_tree(&working, ViewMode::Rendered);
        *tree = working;

        self.publish(markdown);
        Ok(result)
    }

    /// Insert a new table after the block holding `cursor`, sized from the
    /// settings. Returns the new table's key.
    pub fn insert_table(&mut self, cursor: Option<NodeKey>) -> Result<NodeKey> {
        let dims = self.settings.new_table;
        self.edit_tree(|tree| insert_table_at_cursor(tree, cursor, dims))
    }

    /// The raw view's text and selection.
    pub fn raw_buffer(&self) -> Result<RawBuffer> {
        let view = self.view.as_ref().ok_or(Error::NoMountedView)?;
        if view.mode() != ViewMode::Raw {
            return Err(Error::WrongViewMode);
        }
        let tree = view.tree()?;
        Ok(RawBuffer::new(tree.text_content(tree.root())).with_selection(view.selection()))
    }

    /// Move the raw view's cursor.
    pub fn set_raw_selection(&mut self, selection: Selection) -> Result<()> {
        let buffer = self.raw_buffer()?.with_selection(selection);
        if let Some(view) = self.view.as_mut() {
            view.set_selection(buffer.selection);
        }
        Ok(())
    }

    /// Apply an edit to the raw view's buffer and publish its text.
    pub fn edit_raw<R, F>(&mut self, edit: F) -> Result<R>
    where
        F: FnOnce(&mut RawBuffer) -> R,
    {
        let mut buffer = self.raw_buffer()?;
        let result = edit(&mut buffer);

        let tree = self.sync.build_tree(&buffer.text, ViewMode::Raw)?;
        let markdown = self.sync.serialize_tree(&tree, ViewMode::Raw);
        let view = self.view.as_mut().ok_or(Error::NoMountedView)?;
        *view.tree_mut()? = tree;
        view.set_selection(buffer.selection);

        self.publish(markdown);
        Ok(result)
    }

    /// Offer a keystroke in the raw view to the bracket pairing engine.
    ///
    /// With pairing disabled in the settings every key passes through.
    pub fn handle_raw_key(&mut self, key: char) -> Result<KeyOutcome> {
        if !self.settings.bracket_pairing {
            self.raw_buffer()?;
            return Ok(KeyOutcome::PassThrough);
        }
        self.edit_raw(|buffer| brackets::handle_key(buffer, key))
    }

    /// Store `markdown` as the canonical string and notify the listener,
    /// unless nothing changed.
    fn publish(&mut self, markdown: String) {
        if markdown == self.canonical {
            return;
        }
        self.canonical = markdown;
        self.modified = true;
        if let Some(callback) = self.on_change.as_mut() {
            callback(&self.canonical);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::table::cell_texts;
    use crate::markdown::table_edit::{apply_command, GestureTarget, TableCommand};
    use crate::markdown::tree::{NodeKind, TextRun};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Session whose change callback records every published string.
    fn recording_session(content: &str) -> (EditorSession, Rc<RefCell<Vec<String>>>) {
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&changes);
        let mut session = EditorSession::new(Settings::default());
        session.load_content(content);
        session.set_on_change(move |markdown| sink.borrow_mut().push(markdown.to_string()));
        (session, changes)
    }

    fn first_cell_run(tree: &DocumentTree, table: NodeKey) -> NodeKey {
        let row = tree.children(table)[0];
        let cell = tree.children(row)[0];
        let para = tree.children(cell)[0];
        tree.children(para)[0]
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Initialization
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_empty_bootstrap_does_not_fire_callback() {
        init_logger();
        let (mut session, changes) = recording_session("");
        session.mount_and_initialize(1, ViewMode::Rendered).unwrap();

        let tree = session.tree().unwrap();
        assert_eq!(tree.children(tree.root()).len(), 1);
        assert!(changes.borrow().is_empty());
        assert!(!session.is_modified());
        assert_eq!(session.canonical(), "");
    }

    #[test]
    fn test_unedited_document_stays_clean() {
        let (mut session, changes) = recording_session("| A |\n|:-:|\n| 1 |");
        session.mount_and_initialize(1, ViewMode::Rendered).unwrap();
        assert!(changes.borrow().is_empty());
        assert!(!session.is_modified());
    }

    #[test]
    fn test_stale_init_after_unmount_is_ignored() {
        init_logger();
        let (mut session, _) = recording_session("# Hello");
        let pending = session.mount(1, ViewMode::Rendered);
        session.unmount();
        assert!(!session.finish_init(pending).unwrap());
        assert!(matches!(session.tree(), Err(Error::NoMountedView)));
    }

    #[test]
    fn test_stale_init_after_remount_is_ignored() {
        let (mut session, _) = recording_session("# Hello");
        let stale = session.mount(1, ViewMode::Rendered);
        let fresh = session.mount(1, ViewMode::Rendered);
        assert_eq!(stale.key(), fresh.key());

        assert!(!session.finish_init(stale).unwrap());
        assert!(!session.mounted().unwrap().is_initialized());
        assert!(session.finish_init(fresh).unwrap());
        assert!(session.mounted().unwrap().is_initialized());
    }

    #[test]
    fn test_double_init_is_rejected() {
        let (mut session, _) = recording_session("text");
        let pending = session.mount(1, ViewMode::Rendered);
        assert!(session.finish_init(pending).unwrap());
        assert!(matches!(
            session.finish_init(pending),
            Err(Error::AlreadyInitialized)
        ));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Structured edits
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_edit_tree_publishes_markdown() {
        let (mut session, changes) = recording_session("| A | B |\n|---|---|\n| 1 | 2 |");
        session.mount_and_initialize(1, ViewMode::Rendered).unwrap();

        session
            .edit_tree(|tree| {
                let table = tree.tables()[0];
                let run = first_cell_run(tree, table);
                apply_command(tree, GestureTarget::Node(run), TableCommand::InsertRowBelow)
            })
            .unwrap();

        let expected = "| A | B |\n|---|---|\n|  |  |\n| 1 | 2 |";
        assert_eq!(session.canonical(), expected);
        assert_eq!(changes.borrow().as_slice(), [expected.to_string()]);
        assert!(session.is_modified());

        session.mark_saved();
        assert!(!session.is_modified());
    }

    #[test]
    fn test_failed_edit_leaves_state_untouched() {
        let (mut session, changes) = recording_session("Para");
        session.mount_and_initialize(1, ViewMode::Rendered).unwrap();

        let result: Result<()> = session.edit_tree(|tree| {
            let root = tree.root();
            let para = tree.children(root)[0];
            tree.remove(para)?;
            Err(Error::NotInTable)
        });
        assert!(matches!(result, Err(Error::NotInTable)));

        let tree = session.tree().unwrap();
        assert_eq!(tree.text_content(tree.root()), "Para");
        assert_eq!(session.canonical(), "Para");
        assert!(changes.borrow().is_empty());
    }

    #[test]
    fn test_edit_that_breaks_table_shape_is_rejected() {
        let (mut session, _) = recording_session("| A | B |\n|---|---|\n| 1 | 2 |");
        session.mount_and_initialize(1, ViewMode::Rendered).unwrap();

        let result = session.edit_tree(|tree| {
            let table = tree.tables()[0];
            let row = tree.create(NodeKind::TableRow);
            tree.append_child(table, row)
        });
        assert!(matches!(result, Err(Error::InvalidStructure(_))));
        let tree = session.tree().unwrap();
        assert_eq!(tree.children(tree.tables()[0]).len(), 2);
    }

    #[test]
    fn test_edit_requires_rendered_view() {
        let (mut session, _) = recording_session("x");
        assert!(matches!(
            session.edit_tree(|_| Ok(())),
            Err(Error::NoMountedView)
        ));
        session.mount_and_initialize(1, ViewMode::Raw).unwrap();
        assert!(matches!(
            session.edit_tree(|_| Ok(())),
            Err(Error::WrongViewMode)
        ));
    }

    #[test]
    fn test_edit_text_run_publishes() {
        let (mut session, changes) = recording_session("# Title");
        session.mount_and_initialize(1, ViewMode::Rendered).unwrap();
        session
            .edit_tree(|tree| {
                let heading = tree.children(tree.root())[0];
                let run = tree.create_text(TextRun::plain(" more"));
                tree.append_child(heading, run)
            })
            .unwrap();
        assert_eq!(session.canonical(), "# Title more");
        assert_eq!(changes.borrow().len(), 1);
    }

    #[test]
    fn test_insert_table_uses_settings_dimensions() {
        let (mut session, _) = recording_session("Intro");
        session.settings_mut().new_table.columns = 2;
        session.mount_and_initialize(1, ViewMode::Rendered).unwrap();

        let tree = session.tree().unwrap();
        let cursor = tree.children(tree.root())[0];
        let table = session.insert_table(Some(cursor)).unwrap();
        let tree = session.tree().unwrap();
        assert_eq!(cell_texts(tree, table).len(), 3);
        assert_eq!(cell_texts(tree, table)[0].len(), 2);
        assert_eq!(session.canonical(), "Intro\n\n|  |  |\n|---|---|\n|  |  |\n|  |  |");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Raw view
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_raw_key_pairs_brackets_and_publishes() {
        let (mut session, changes) = recording_session("see ");
        session.mount_and_initialize(1, ViewMode::Raw).unwrap();

        assert_eq!(session.handle_raw_key('[').unwrap(), KeyOutcome::Handled);
        assert_eq!(session.canonical(), "see []");
        assert_eq!(session.raw_buffer().unwrap().selection, Selection::collapsed(5));

        // Stepping over `]` moves the cursor only.
        assert_eq!(session.handle_raw_key(']').unwrap(), KeyOutcome::Handled);
        assert_eq!(session.raw_buffer().unwrap().selection, Selection::collapsed(6));
        assert_eq!(changes.borrow().len(), 1);
    }

    #[test]
    fn test_raw_key_pass_through_when_disabled() {
        let (mut session, _) = recording_session("a");
        session.settings_mut().bracket_pairing = false;
        session.mount_and_initialize(1, ViewMode::Raw).unwrap();
        assert_eq!(session.handle_raw_key('[').unwrap(), KeyOutcome::PassThrough);
        assert_eq!(session.canonical(), "a");
    }

    #[test]
    fn test_raw_key_requires_raw_view() {
        let (mut session, _) = recording_session("a");
        session.mount_and_initialize(1, ViewMode::Rendered).unwrap();
        assert!(matches!(
            session.handle_raw_key('['),
            Err(Error::WrongViewMode)
        ));
    }

    #[test]
    fn test_edit_raw_and_toggle_view() {
        let (mut session, changes) = recording_session("");
        session.mount_and_initialize(7, ViewMode::Raw).unwrap();
        session
            .edit_raw(|buffer| buffer.insert_text("| A |\n|---|\n| 1 |"))
            .unwrap();
        assert_eq!(changes.borrow().len(), 1);

        assert_eq!(session.toggle_view().unwrap(), ViewMode::Rendered);
        let tree = session.tree().unwrap();
        assert_eq!(tree.tables().len(), 1);
        assert_eq!(session.mounted().unwrap().key().tab_id, 7);
        // Switching views does not publish.
        assert_eq!(changes.borrow().len(), 1);
    }

    #[test]
    fn test_mount_default_uses_configured_mode() {
        let mut settings = Settings::default();
        settings.view_mode = ViewMode::Raw;
        let mut session: EditorSession = EditorSession::new(settings);
        session.load_content("# Title");

        let pending = session.mount_default(3);
        assert_eq!(pending.key().mode, ViewMode::Raw);
        assert!(session.finish_init(pending).unwrap());
        assert_eq!(session.raw_buffer().unwrap().text, "# Title");

        session.settings_mut().view_mode = ViewMode::Rendered;
        let pending = session.mount_default(3);
        assert_eq!(pending.key().mode, ViewMode::Rendered);
        assert!(session.finish_init(pending).unwrap());
        assert_eq!(session.tree().unwrap().tables().len(), 0);
    }

    #[test]
    fn test_load_content_drops_view() {
        let (mut session, changes) = recording_session("old");
        session.mount_and_initialize(1, ViewMode::Rendered).unwrap();
        session.load_content("new");
        assert!(session.mounted().is_none());
        assert_eq!(session.canonical(), "new");
        assert!(changes.borrow().is_empty());
    }
}
