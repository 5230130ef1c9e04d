//! The page tree: Page and Pages records, inheritable attributes, and a
//! depth-first page iterator.

use std::rc::Rc;

use log::trace;

use crate::content::ContentStream;
use crate::deserialize::{DictReader, FromObject, ObjRef};
use crate::error::{PdfError, PdfErrorKind, PdfResult, ResultExt};
use crate::geom::Rect;
use crate::object::{ObjId, PdfObject};
use crate::reader::{OptResolver, PdfReader};
use crate::resources::Resources;

/// Page-tree recursion bound.
const MAX_TREE_DEPTH: usize = 1024;

// ── Records ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Page {
    pub parent: ObjId,
    pub resources: Option<Resources>,
    pub media_box: Option<Rect>,
    pub crop_box: Option<Rect>,
    pub rotate: Option<i32>,
    pub contents: Option<Vec<ObjRef<ContentStream>>>,
}

impl FromObject for Page {
    fn from_object(object: &PdfObject, resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        let mut fields = DictReader::new(object, resolver, false, "Page")?;
        let type_name: String = fields.required("Type")?;
        let parent = fields.required("Parent")?;
        fields.ignored("LastModified");
        let resources = fields.optional("Resources")?;
        let media_box = fields.optional("MediaBox")?;
        let crop_box = fields.optional("CropBox")?;
        fields.optional::<Rect>("BleedBox")?;
        fields.optional::<Rect>("TrimBox")?;
        fields.optional::<Rect>("ArtBox")?;
        fields.unimplemented("BoxColorInfo")?;
        let contents = fields.optional_as_array("Contents")?;
        let rotate = fields.optional("Rotate")?;
        fields.ignored("Group");
        fields.ignored("Thumb");
        fields.ignored("B");
        fields.ignored("Dur");
        fields.ignored("Trans");
        fields.ignored("Annots");
        fields.ignored("AA");
        fields.ignored("Metadata");
        fields.ignored("PieceInfo");
        fields.unimplemented("StructParents")?;
        fields.ignored("ID");
        fields.ignored("PZ");
        fields.unimplemented("SeparationInfo")?;
        fields.ignored("Tabs");
        fields.ignored("TemplateInstantiated");
        fields.ignored("PresSteps");
        fields.unimplemented("UserUnit")?;
        fields.unimplemented("VP")?;
        fields.finish()?;

        if type_name != "Page" {
            return Err(PdfError::with_message(
                PdfErrorKind::InvalidSubtype,
                "`Type` must be `Page`",
            ));
        }

        Ok(Page {
            parent,
            resources,
            media_box,
            crop_box,
            rotate,
            contents,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Pages {
    pub parent: Option<ObjId>,
    pub kids: Vec<ObjRef<PageTreeNode>>,
    pub count: i32,
    pub resources: Option<Resources>,
    pub media_box: Option<Rect>,
    pub crop_box: Option<Rect>,
    pub rotate: Option<i32>,
}

impl FromObject for Pages {
    fn from_object(object: &PdfObject, resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        let mut fields = DictReader::new(object, resolver, false, "Pages")?;
        let type_name: String = fields.required("Type")?;
        let parent = fields.optional("Parent")?;
        let kids = fields.required_as_array("Kids")?;
        let count = fields.required("Count")?;
        let resources = fields.optional("Resources")?;
        let media_box = fields.optional("MediaBox")?;
        let crop_box = fields.optional("CropBox")?;
        let rotate = fields.optional("Rotate")?;
        fields.finish()?;

        if type_name != "Pages" {
            return Err(PdfError::with_message(
                PdfErrorKind::InvalidSubtype,
                "`Type` must be `Pages`",
            ));
        }

        Ok(Pages {
            parent,
            kids,
            count,
            resources,
            media_box,
            crop_box,
            rotate,
        })
    }
}

/// An interior or leaf node, distinguished by `Type`.
#[derive(Debug, Clone)]
pub enum PageTreeNode {
    Page(Page),
    Pages(Pages),
}

impl FromObject for PageTreeNode {
    fn from_object(object: &PdfObject, resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        let mut stub = DictReader::new(object, resolver, true, "PageTree type stub")?;
        let type_name: String = stub.required("Type")?;
        stub.finish()?;

        match type_name.as_str() {
            "Page" => Ok(PageTreeNode::Page(Page::from_object(object, resolver)?)),
            "Pages" => Ok(PageTreeNode::Pages(Pages::from_object(object, resolver)?)),
            other => Err(PdfError::with_message(
                PdfErrorKind::InvalidSubtype,
                format!("`Type` must be `Page` or `Pages`, found `{}`", other),
            )),
        }
    }
}

// ── Inheritance ───────────────────────────────────────────────────────────────

/// Copy the inheritable attributes (Resources, MediaBox, CropBox,
/// Rotate) from a parent into a child that lacks them.
pub fn inherit_attributes(node: &mut PageTreeNode, parent: &Pages) {
    let (resources, media_box, crop_box, rotate) = match node {
        PageTreeNode::Page(page) => (
            &mut page.resources,
            &mut page.media_box,
            &mut page.crop_box,
            &mut page.rotate,
        ),
        PageTreeNode::Pages(pages) => (
            &mut pages.resources,
            &mut pages.media_box,
            &mut pages.crop_box,
            &mut pages.rotate,
        ),
    };

    if resources.is_none() {
        *resources = parent.resources.clone();
    }
    if media_box.is_none() {
        *media_box = parent.media_box;
    }
    if crop_box.is_none() {
        *crop_box = parent.crop_box;
    }
    if rotate.is_none() {
        *rotate = parent.rotate;
    }
}

// ── Iteration ─────────────────────────────────────────────────────────────────

struct IterFrame {
    node: Pages,
    next_child_idx: usize,
}

/// Depth-first walk of the page tree, yielding leaves with their
/// inherited attributes filled in.
pub struct PageIter {
    stack: Vec<IterFrame>,
    page_idx: usize,
}

impl PageIter {
    pub fn new(reader: &mut PdfReader, root: &ObjRef<Pages>) -> PdfResult<Self> {
        let root = root.resolve(reader).ctx("resolving the page tree root")?;
        Ok(PageIter {
            stack: vec![IterFrame {
                node: (*root).clone(),
                next_child_idx: 0,
            }],
            page_idx: 0,
        })
    }

    /// Pages emitted so far.
    pub fn page_idx(&self) -> usize {
        self.page_idx
    }

    pub fn next_page(&mut self, reader: &mut PdfReader) -> PdfResult<Option<Page>> {
        while let Some(frame_idx) = self.stack.len().checked_sub(1) {
            let frame = &mut self.stack[frame_idx];
            let Some(kid_ref) = frame.node.kids.get(frame.next_child_idx) else {
                self.stack.pop();
                continue;
            };
            let kid_ref = kid_ref.clone();
            frame.next_child_idx += 1;

            let resolved: Rc<PageTreeNode> = kid_ref.resolve(reader)?;
            let mut kid = (*resolved).clone();
            let parent = self.stack[frame_idx].node.clone();
            inherit_attributes(&mut kid, &parent);

            match kid {
                PageTreeNode::Page(page) => {
                    trace!("yielding page {}", self.page_idx);
                    self.page_idx += 1;
                    return Ok(Some(page));
                }
                PageTreeNode::Pages(pages) => {
                    if self.stack.len() >= MAX_TREE_DEPTH {
                        return Err(PdfError::with_message(
                            PdfErrorKind::PageTreeTooDeep,
                            format!("page tree deeper than {}", MAX_TREE_DEPTH),
                        ));
                    }
                    self.stack.push(IterFrame {
                        node: pages,
                        next_child_idx: 0,
                    });
                }
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_pages() -> Pages {
        Pages {
            parent: None,
            kids: Vec::new(),
            count: 0,
            resources: None,
            media_box: None,
            crop_box: None,
            rotate: None,
        }
    }

    fn bare_page() -> Page {
        Page {
            parent: ObjId(1, 0),
            resources: None,
            media_box: None,
            crop_box: None,
            rotate: None,
            contents: None,
        }
    }

    #[test]
    fn inheritance_fills_missing_attributes() {
        let mut parent = bare_pages();
        parent.media_box = Some(Rect {
            llx: 0.0,
            lly: 0.0,
            urx: 612.0,
            ury: 792.0,
        });
        parent.rotate = Some(90);

        let mut node = PageTreeNode::Page(bare_page());
        inherit_attributes(&mut node, &parent);

        let PageTreeNode::Page(page) = node else {
            unreachable!();
        };
        assert_eq!(page.media_box.unwrap().urx, 612.0);
        assert_eq!(page.rotate, Some(90));
    }

    #[test]
    fn inheritance_never_overrides() {
        let mut parent = bare_pages();
        parent.rotate = Some(90);

        let mut page = bare_page();
        page.rotate = Some(180);
        let mut node = PageTreeNode::Page(page);
        inherit_attributes(&mut node, &parent);

        let PageTreeNode::Page(page) = node else {
            unreachable!();
        };
        assert_eq!(page.rotate, Some(180));
    }

    #[test]
    fn intermediate_nodes_inherit_too() {
        let mut parent = bare_pages();
        parent.rotate = Some(270);

        let mut node = PageTreeNode::Pages(bare_pages());
        inherit_attributes(&mut node, &parent);

        let PageTreeNode::Pages(pages) = node else {
            unreachable!();
        };
        assert_eq!(pages.rotate, Some(270));
    }
}
