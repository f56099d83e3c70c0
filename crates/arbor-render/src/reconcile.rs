//! List diffing, node creation, update dispatch and removal.
//!
//! The diff walks the old and new sibling lists from both ends: a forward
//! loop that also probes the high end for reversals, then a backward loop
//! that falls back to a key map for arbitrary permutations. Matched
//! descriptors are updated in place, relocated nodes move as a block, and
//! whatever is left over is created or removed in one sweep. A removed
//! plain node may be offered to the new list's recycling pool and revived
//! by a later pass.

use std::cell::Cell;
use std::rc::Rc;

use arbor_core::collections::map::HashMap;
use arbor_core::{
    normalize, Attrs, Children, ComponentState, Hooks, NodeList, PoolCell, Tag, Vnode, VnodeRef,
};
use arbor_dom::{NodeRef, MATHML_NS, SVG_NS};

use crate::{check_state, HookQueue, RenderError, Renderer};

impl Renderer {
    pub(crate) fn update_nodes(
        &self,
        parent: &NodeRef,
        old: Option<&NodeList>,
        vnodes: Option<&NodeList>,
        recycling_parent: bool,
        hooks: &mut HookQueue,
        next_sibling: Option<NodeRef>,
        ns: Option<&str>,
    ) -> Result<(), RenderError> {
        let (old, new) = match (old, vnodes) {
            (None, None) => return Ok(()),
            (None, Some(new)) => {
                return self.create_nodes(parent, new.items(), 0, new.len(), hooks, next_sibling.as_ref(), ns)
            }
            (Some(old), None) => {
                self.remove_nodes(old.items(), 0, old.len(), None, recycling_parent);
                return Ok(());
            }
            (Some(old), Some(new)) => {
                if std::ptr::eq(old, new) && !recycling_parent {
                    return Ok(());
                }
                (old, new)
            }
        };

        let new_items = new.items();
        let original_old_len = old.len();
        let common_len = original_old_len.min(new_items.len());
        let mut is_unkeyed = false;
        for index in 0..common_len {
            if let (Some(o), Some(v)) = (&old.items()[index], &new_items[index]) {
                if o.key().is_none() && v.key().is_none() {
                    is_unkeyed = true;
                }
                break;
            }
        }

        // Equal-length unkeyed lists diff pairwise with no index bookkeeping.
        if is_unkeyed && original_old_len == new_items.len() {
            let old_items = old.items();
            for index in 0..original_old_len {
                match (&old_items[index], &new_items[index]) {
                    (Some(o), Some(v)) if Rc::ptr_eq(o, v) && !recycling_parent => {}
                    (None, None) => {}
                    (None, Some(v)) => {
                        let anchor = get_next_sibling(
                            old_items,
                            index + 1,
                            original_old_len,
                            next_sibling.clone(),
                        );
                        self.create_node(parent, v, hooks, ns, anchor.as_ref())?;
                    }
                    (Some(_), None) => {
                        self.remove_nodes(old_items, index, index + 1, Some(new), recycling_parent);
                    }
                    (Some(o), Some(v)) => {
                        let anchor = get_next_sibling(
                            old_items,
                            index + 1,
                            original_old_len,
                            next_sibling.clone(),
                        );
                        self.update_node(parent, o, v, hooks, anchor.as_ref(), recycling_parent, ns)?;
                    }
                }
            }
            return Ok(());
        }

        // Activate the pool: pooled descriptors join the working copy past
        // the original boundary, so the loops can match them by key.
        let mut old_items: Vec<Option<VnodeRef>> = old.items().to_vec();
        let mut has_pool = false;
        if let Some(pool) = old.pool() {
            if is_recyclable(old.items(), &pool.borrow(), new_items) {
                has_pool = true;
                old_items.extend(pool.borrow().iter().cloned().map(Some));
                log::trace!("recycling pool activated ({} candidates)", pool.borrow().len());
            }
        }

        let mut old_start: isize = 0;
        let mut start: isize = 0;
        let mut old_end: isize = old_items.len() as isize - 1;
        let mut end: isize = new_items.len() as isize - 1;
        let mut map: Option<HashMap<arbor_core::Key, usize>> = None;
        let mut next_sibling = next_sibling;

        while old_end >= old_start && end >= start {
            let o = old_items[old_start as usize].clone();
            let v = new_items[start as usize].clone();
            let o_from_pool = has_pool && old_start as usize >= original_old_len;
            match (&o, &v) {
                (Some(o), Some(v))
                    if Rc::ptr_eq(o, v) && !o_from_pool && !recycling_parent =>
                {
                    old_start += 1;
                    start += 1;
                }
                (None, None) => {
                    old_start += 1;
                    start += 1;
                }
                (None, Some(v)) => {
                    if is_unkeyed || v.key().is_none() {
                        start += 1;
                        let anchor = get_next_sibling(
                            &old_items,
                            start as usize,
                            original_old_len,
                            next_sibling.clone(),
                        );
                        self.create_node(parent, v, hooks, ns, anchor.as_ref())?;
                    }
                    old_start += 1;
                }
                (Some(o), None) => {
                    if is_unkeyed || o.key().is_none() {
                        self.remove_nodes(
                            &old_items,
                            start as usize,
                            start as usize + 1,
                            Some(new),
                            recycling_parent,
                        );
                        old_start += 1;
                    }
                    start += 1;
                }
                (Some(o), Some(v)) if o.key() == v.key() => {
                    old_start += 1;
                    start += 1;
                    let anchor = get_next_sibling(
                        &old_items,
                        old_start as usize,
                        original_old_len,
                        next_sibling.clone(),
                    );
                    self.update_node(
                        parent,
                        o,
                        v,
                        hooks,
                        anchor.as_ref(),
                        o_from_pool || recycling_parent,
                        ns,
                    )?;
                    if o_from_pool && o.tag().same(v.tag()) {
                        insert_node(parent, &self.to_fragment(v), next_sibling.as_ref());
                    }
                }
                (Some(_), Some(v)) => {
                    // Probe the high end: a reversal shows up as the new
                    // low item matching the old high item.
                    let o = old_items[old_end as usize].clone();
                    let o_from_pool = has_pool && old_end as usize >= original_old_len;
                    match &o {
                        Some(o) if Rc::ptr_eq(o, v) && !o_from_pool && !recycling_parent => {
                            old_end -= 1;
                            start += 1;
                        }
                        None => {
                            old_end -= 1;
                        }
                        Some(o) if o.key() == v.key() => {
                            let anchor = get_next_sibling(
                                &old_items,
                                (old_end + 1) as usize,
                                original_old_len,
                                next_sibling.clone(),
                            );
                            self.update_node(
                                parent,
                                o,
                                v,
                                hooks,
                                anchor.as_ref(),
                                o_from_pool || recycling_parent,
                                ns,
                            )?;
                            if o_from_pool && o.tag().same(v.tag()) || start < end {
                                let anchor = get_next_sibling(
                                    &old_items,
                                    old_start as usize,
                                    original_old_len,
                                    next_sibling.clone(),
                                );
                                insert_node(parent, &self.to_fragment(v), anchor.as_ref());
                            }
                            old_end -= 1;
                            start += 1;
                        }
                        Some(_) => break,
                    }
                }
            }
        }

        while old_end >= old_start && end >= start {
            let o = old_items[old_end as usize].clone();
            let v = new_items[end as usize].clone();
            let o_from_pool = has_pool && old_end as usize >= original_old_len;
            match (&o, &v) {
                (Some(o), Some(v))
                    if Rc::ptr_eq(o, v) && !o_from_pool && !recycling_parent =>
                {
                    old_end -= 1;
                    end -= 1;
                }
                (None, _) => {
                    old_end -= 1;
                }
                (_, None) => {
                    end -= 1;
                }
                (Some(o), Some(v)) if o.key() == v.key() => {
                    let anchor = get_next_sibling(
                        &old_items,
                        (old_end + 1) as usize,
                        original_old_len,
                        next_sibling.clone(),
                    );
                    self.update_node(
                        parent,
                        o,
                        v,
                        hooks,
                        anchor.as_ref(),
                        o_from_pool || recycling_parent,
                        ns,
                    )?;
                    if o_from_pool && o.tag().same(v.tag()) {
                        insert_node(parent, &self.to_fragment(v), next_sibling.as_ref());
                    }
                    if let Some(dom) = o.dom() {
                        next_sibling = Some(dom);
                    }
                    old_end -= 1;
                    end -= 1;
                }
                (Some(_), Some(v)) => {
                    // Arbitrary permutation: look the key up in a map built
                    // over the unprocessed low range.
                    let map =
                        map.get_or_insert_with(|| get_key_map(&old_items, old_end as usize));
                    let old_index = v.key().and_then(|key| map.get(key).copied());
                    if let Some(old_index) = old_index {
                        let o = old_items[old_index].clone().expect("mapped slot is filled");
                        let o_from_pool = has_pool && old_index >= original_old_len;
                        let anchor = get_next_sibling(
                            &old_items,
                            (old_end + 1) as usize,
                            original_old_len,
                            next_sibling.clone(),
                        );
                        self.update_node(
                            parent,
                            &o,
                            v,
                            hooks,
                            anchor.as_ref(),
                            o_from_pool || recycling_parent,
                            ns,
                        )?;
                        insert_node(parent, &self.to_fragment(v), next_sibling.as_ref());
                        o.set_skip(true);
                        if let Some(dom) = o.dom() {
                            next_sibling = Some(dom);
                        }
                    } else {
                        self.create_node(parent, v, hooks, ns, next_sibling.as_ref())?;
                        next_sibling = v.dom().or(next_sibling);
                    }
                    end -= 1;
                }
            }
            if end < start {
                break;
            }
        }

        if end >= start {
            self.create_nodes(
                parent,
                new_items,
                start as usize,
                (end + 1) as usize,
                hooks,
                next_sibling.as_ref(),
                ns,
            )?;
        }
        if old_end + 1 > old_start {
            let removal_end = ((old_end + 1) as usize).min(original_old_len);
            if removal_end > old_start as usize {
                self.remove_nodes(
                    &old_items,
                    old_start as usize,
                    removal_end,
                    Some(new),
                    recycling_parent,
                );
            }
        }
        if has_pool {
            // Unmatched pool leftovers fold into the fresh pool; a stale
            // skip mark from a relocation is cleared instead.
            let limit = (old_start as usize).max(original_old_len) as isize;
            while old_end >= limit {
                if let Some(o) = &old_items[old_end as usize] {
                    if o.skip() {
                        o.set_skip(false);
                    } else {
                        add_to_pool(o, Some(new));
                    }
                }
                old_end -= 1;
            }
        }
        Ok(())
    }

    fn create_nodes(
        &self,
        parent: &NodeRef,
        items: &[Option<VnodeRef>],
        start: usize,
        end: usize,
        hooks: &mut HookQueue,
        next_sibling: Option<&NodeRef>,
        ns: Option<&str>,
    ) -> Result<(), RenderError> {
        for item in items[start..end].iter().flatten() {
            self.create_node(parent, item, hooks, ns, next_sibling)?;
        }
        Ok(())
    }

    pub(crate) fn create_node(
        &self,
        parent: &NodeRef,
        vnode: &VnodeRef,
        hooks: &mut HookQueue,
        ns: Option<&str>,
        next_sibling: Option<&NodeRef>,
    ) -> Result<NodeRef, RenderError> {
        if vnode.tag().is_component() {
            return self.create_component(parent, vnode, hooks, ns, next_sibling);
        }
        let hook_rec = vnode.attrs().as_ref().map(|attrs| attrs.hooks.clone());
        if let Some(hook_rec) = &hook_rec {
            init_attr_lifecycle(hook_rec, vnode, hooks);
        }
        match vnode.tag() {
            Tag::Text => Ok(self.create_text(parent, vnode, next_sibling)),
            Tag::Trust => Ok(self.create_html(parent, vnode, ns, next_sibling)),
            Tag::Fragment => self.create_fragment_node(parent, vnode, hooks, ns, next_sibling),
            Tag::Element(_) => self.create_element_node(parent, vnode, hooks, ns, next_sibling),
            Tag::Component(_) => unreachable!("components dispatch above"),
        }
    }

    fn create_text(
        &self,
        parent: &NodeRef,
        vnode: &VnodeRef,
        next_sibling: Option<&NodeRef>,
    ) -> NodeRef {
        let text = vnode.children().as_text().unwrap_or("").to_owned();
        let dom = self.document().create_text(&text);
        vnode.set_dom(Some(dom.clone()));
        insert_node(parent, &dom, next_sibling);
        dom
    }

    fn create_html(
        &self,
        parent: &NodeRef,
        vnode: &VnodeRef,
        ns: Option<&str>,
        next_sibling: Option<&NodeRef>,
    ) -> NodeRef {
        let markup = vnode.children().as_text().unwrap_or("").to_owned();
        // Markup whose leading element only parses inside a specific parent
        // (td, tr, ...) gets a matching scratch context.
        let context = leading_tag_name(&markup)
            .as_deref()
            .and_then(scratch_parent)
            .unwrap_or("div");
        let fragment = self.document().parse_fragment(context, ns, &markup);
        vnode.set_dom(fragment.first_child());
        vnode.set_dom_size(Some(fragment.child_count()));
        insert_node(parent, &fragment, next_sibling);
        fragment
    }

    fn create_fragment_node(
        &self,
        parent: &NodeRef,
        vnode: &VnodeRef,
        hooks: &mut HookQueue,
        ns: Option<&str>,
        next_sibling: Option<&NodeRef>,
    ) -> Result<NodeRef, RenderError> {
        let fragment = self.document().create_fragment();
        {
            let children = vnode.children();
            if let Some(list) = children.as_nodes() {
                self.create_nodes(&fragment, list.items(), 0, list.len(), hooks, None, ns)?;
            }
        }
        vnode.set_dom(fragment.first_child());
        vnode.set_dom_size(Some(fragment.child_count()));
        insert_node(parent, &fragment, next_sibling);
        Ok(fragment)
    }

    fn create_element_node(
        &self,
        parent: &NodeRef,
        vnode: &VnodeRef,
        hooks: &mut HookQueue,
        ns: Option<&str>,
        next_sibling: Option<&NodeRef>,
    ) -> Result<NodeRef, RenderError> {
        let tag = match vnode.tag() {
            Tag::Element(name) => name.clone(),
            _ => unreachable!(),
        };
        hoist_textarea_value(vnode);
        let ns = element_namespace(vnode, ns);
        let ns = ns.as_deref();
        let is = vnode.attrs().as_ref().and_then(|attrs| attrs.is.clone());
        let element = self.document().create_element_full(&tag, ns, is.as_deref());
        vnode.set_dom(Some(element.clone()));
        if vnode.attrs().is_some() {
            self.set_attrs(vnode, ns);
        }
        insert_node(parent, &element, next_sibling);

        let editable = vnode
            .attrs()
            .as_ref()
            .is_some_and(|attrs| attrs.has("contenteditable"));
        if editable {
            self.set_content_editable(vnode)?;
            return Ok(element);
        }
        let text = match &*vnode.children() {
            Children::Text(text) => Some(text.clone()),
            _ => None,
        };
        if let Some(text) = text {
            if !text.is_empty() {
                let node = self.document().create_text(&text);
                element.append_child(&node);
            } else {
                // Empty text becomes a real (empty) text child so later
                // passes diff it like any other node.
                *vnode.children_mut() =
                    Children::Nodes(NodeList::new(vec![Some(Vnode::text(String::new()))]));
            }
        }
        let has_nodes = matches!(&*vnode.children(), Children::Nodes(_));
        if has_nodes {
            {
                let children = vnode.children();
                let list = children.as_nodes().expect("checked above");
                self.create_nodes(&element, list.items(), 0, list.len(), hooks, None, ns)?;
            }
            self.set_late_attrs(vnode);
        }
        Ok(element)
    }

    fn init_component(&self, vnode: &VnodeRef, hooks: &mut HookQueue) -> Result<(), RenderError> {
        let spec = match vnode.tag() {
            Tag::Component(spec) => spec.clone(),
            _ => return Ok(()),
        };
        let state = ComponentState::new(spec.create());
        vnode.set_state(Some(state.clone()));
        if !state.begin_render() {
            return Ok(());
        }
        let original = vnode.state();
        state.with_component(|component| component.oninit(vnode));
        check_state(vnode, &original);
        {
            let state = state.clone();
            let vnode = vnode.clone();
            hooks.push(Box::new(move || {
                state.with_component(|component| component.oncreate(&vnode))
            }));
        }
        let hook_rec = vnode.attrs().as_ref().map(|attrs| attrs.hooks.clone());
        if let Some(hook_rec) = &hook_rec {
            init_attr_lifecycle(hook_rec, vnode, hooks);
        }
        let view = state.with_component(|component| component.view(vnode));
        check_state(vnode, &original);
        state.end_render();
        let instance = normalize(view);
        if let Some(instance) = &instance {
            if Rc::ptr_eq(instance, vnode) {
                return Err(RenderError::ViewAlias);
            }
        }
        vnode.set_instance(instance);
        Ok(())
    }

    fn create_component(
        &self,
        parent: &NodeRef,
        vnode: &VnodeRef,
        hooks: &mut HookQueue,
        ns: Option<&str>,
        next_sibling: Option<&NodeRef>,
    ) -> Result<NodeRef, RenderError> {
        self.init_component(vnode, hooks)?;
        if let Some(instance) = vnode.instance() {
            let element = self.create_node(parent, &instance, hooks, ns, next_sibling)?;
            vnode.set_dom(instance.dom());
            vnode.set_dom_size(if instance.dom().is_some() {
                instance.dom_size()
            } else {
                Some(0)
            });
            Ok(element)
        } else {
            vnode.set_dom_size(Some(0));
            Ok(self.document().create_fragment())
        }
    }

    pub(crate) fn update_node(
        &self,
        parent: &NodeRef,
        old: &VnodeRef,
        vnode: &VnodeRef,
        hooks: &mut HookQueue,
        next_sibling: Option<&NodeRef>,
        recycling: bool,
        ns: Option<&str>,
    ) -> Result<(), RenderError> {
        if !old.tag().same(vnode.tag()) {
            self.remove_node(old, None, recycling);
            self.create_node(parent, vnode, hooks, ns, next_sibling)?;
            return Ok(());
        }
        vnode.set_state(old.state());
        vnode.set_events(old.events());
        if !recycling && self.should_not_update(vnode, old) {
            return Ok(());
        }
        if vnode.tag().is_component() {
            return self.update_component(parent, old, vnode, hooks, next_sibling, recycling, ns);
        }
        // When recycling, the revived node goes through the creation
        // lifecycle again rather than the update one.
        let hook_rec = vnode.attrs().as_ref().map(|attrs| attrs.hooks.clone());
        if let Some(hook_rec) = &hook_rec {
            if recycling {
                init_attr_lifecycle(hook_rec, vnode, hooks);
            } else {
                update_attr_lifecycle(hook_rec, vnode, hooks);
            }
        }
        match vnode.tag() {
            Tag::Text => {
                update_text(old, vnode);
                Ok(())
            }
            Tag::Trust => self.update_html(parent, old, vnode, ns, next_sibling),
            Tag::Fragment => {
                self.update_fragment(parent, old, vnode, recycling, hooks, next_sibling, ns)
            }
            Tag::Element(_) => self.update_element(old, vnode, recycling, hooks, ns),
            Tag::Component(_) => unreachable!("components dispatch above"),
        }
    }

    fn update_html(
        &self,
        parent: &NodeRef,
        old: &VnodeRef,
        vnode: &VnodeRef,
        ns: Option<&str>,
        next_sibling: Option<&NodeRef>,
    ) -> Result<(), RenderError> {
        let old_markup = old.children().as_text().unwrap_or("").to_owned();
        let new_markup = vnode.children().as_text().unwrap_or("").to_owned();
        if old_markup != new_markup {
            // Gather the old run into a throwaway fragment, then reparse.
            self.to_fragment(old);
            self.create_html(parent, vnode, ns, next_sibling);
        } else {
            vnode.set_dom(old.dom());
            vnode.set_dom_size(old.dom_size());
        }
        Ok(())
    }

    fn update_fragment(
        &self,
        parent: &NodeRef,
        old: &VnodeRef,
        vnode: &VnodeRef,
        recycling: bool,
        hooks: &mut HookQueue,
        next_sibling: Option<&NodeRef>,
        ns: Option<&str>,
    ) -> Result<(), RenderError> {
        {
            let old_children = old.children();
            let new_children = vnode.children();
            self.update_nodes(
                parent,
                old_children.as_nodes(),
                new_children.as_nodes(),
                recycling,
                hooks,
                next_sibling.cloned(),
                ns,
            )?;
        }
        let mut dom_size = 0usize;
        let mut first: Option<NodeRef> = None;
        if let Some(list) = vnode.children().as_nodes() {
            for child in list.items().iter().flatten() {
                if let Some(dom) = child.dom() {
                    if first.is_none() {
                        first = Some(dom);
                    }
                    dom_size += child.dom_size().unwrap_or(1);
                }
            }
        }
        vnode.set_dom(first);
        vnode.set_dom_size(if dom_size != 1 { Some(dom_size) } else { None });
        Ok(())
    }

    fn update_element(
        &self,
        old: &VnodeRef,
        vnode: &VnodeRef,
        recycling: bool,
        hooks: &mut HookQueue,
        ns: Option<&str>,
    ) -> Result<(), RenderError> {
        let Some(element) = old.dom() else {
            return Ok(());
        };
        vnode.set_dom(Some(element.clone()));
        let ns = element_namespace(vnode, ns);
        let ns = ns.as_deref();
        hoist_textarea_value(vnode);
        {
            let old_attrs = old.attrs();
            let new_attrs = vnode.attrs();
            self.update_attrs(vnode, old_attrs.as_ref(), new_attrs.as_ref(), ns);
        }
        let editable = vnode
            .attrs()
            .as_ref()
            .is_some_and(|attrs| attrs.has("contenteditable"));
        if editable {
            return self.set_content_editable(vnode);
        }
        let old_text: Option<String> = old.children().as_text().map(str::to_owned);
        let new_text: Option<String> = vnode.children().as_text().map(str::to_owned);
        if let (Some(old_text), Some(new_text)) = (&old_text, &new_text) {
            if !new_text.is_empty() {
                if old_text != new_text {
                    if let Some(first) = element.first_child() {
                        first.set_node_value(new_text);
                    }
                }
                return Ok(());
            }
        }
        if let Some(old_text) = old_text {
            let synthesized = Vnode::text(old_text);
            synthesized.set_dom(element.first_child());
            *old.children_mut() = Children::Nodes(NodeList::new(vec![Some(synthesized)]));
        }
        if let Some(new_text) = new_text {
            *vnode.children_mut() =
                Children::Nodes(NodeList::new(vec![Some(Vnode::text(new_text))]));
        }
        let old_children = old.children();
        let new_children = vnode.children();
        self.update_nodes(
            &element,
            old_children.as_nodes(),
            new_children.as_nodes(),
            recycling,
            hooks,
            None,
            ns,
        )
    }

    fn update_component(
        &self,
        parent: &NodeRef,
        old: &VnodeRef,
        vnode: &VnodeRef,
        hooks: &mut HookQueue,
        next_sibling: Option<&NodeRef>,
        recycling: bool,
        ns: Option<&str>,
    ) -> Result<(), RenderError> {
        if recycling {
            self.init_component(vnode, hooks)?;
        } else if let Some(state) = vnode.state() {
            if state.begin_render() {
                let original = vnode.state();
                let view = state.with_component(|component| component.view(vnode));
                check_state(vnode, &original);
                state.end_render();
                let instance = normalize(view);
                if let Some(instance) = &instance {
                    if Rc::ptr_eq(instance, vnode) {
                        return Err(RenderError::ViewAlias);
                    }
                }
                vnode.set_instance(instance);
            } else {
                log::warn!("component view re-entered while rendering; producing nothing");
                vnode.set_instance(None);
            }
            let hook_rec = vnode.attrs().as_ref().map(|attrs| attrs.hooks.clone());
            if let Some(hook_rec) = &hook_rec {
                update_attr_lifecycle(hook_rec, vnode, hooks);
            }
            {
                let state = state.clone();
                let vnode = vnode.clone();
                hooks.push(Box::new(move || {
                    state.with_component(|component| component.onupdate(&vnode))
                }));
            }
        }
        if let Some(instance) = vnode.instance() {
            match old.instance() {
                None => {
                    self.create_node(parent, &instance, hooks, ns, next_sibling)?;
                }
                Some(old_instance) => {
                    self.update_node(
                        parent,
                        &old_instance,
                        &instance,
                        hooks,
                        next_sibling,
                        recycling,
                        ns,
                    )?;
                }
            }
            vnode.set_dom(instance.dom());
            vnode.set_dom_size(instance.dom_size());
        } else if let Some(old_instance) = old.instance() {
            self.remove_node(&old_instance, None, recycling);
            vnode.set_dom(None);
            vnode.set_dom_size(Some(0));
        } else {
            vnode.set_dom(old.dom());
            vnode.set_dom_size(old.dom_size());
        }
        Ok(())
    }

    fn should_not_update(&self, vnode: &VnodeRef, old: &VnodeRef) -> bool {
        let original = vnode.state();
        let force_attr: Option<bool> = {
            let hook = vnode
                .attrs()
                .as_ref()
                .and_then(|attrs| attrs.hooks.onbeforeupdate.clone());
            match hook {
                Some(hook) => {
                    let result = hook(vnode, old);
                    check_state(vnode, &original);
                    result
                }
                None => None,
            }
        };
        let force_component: Option<bool> = if vnode.tag().is_component() {
            match vnode.state() {
                Some(state) => {
                    let result =
                        state.with_component(|component| component.onbeforeupdate(vnode, old));
                    check_state(vnode, &original);
                    result
                }
                None => None,
            }
        } else {
            None
        };
        // Skip only when at least one opinion was expressed and every
        // expressed opinion said "do not update".
        if !(force_attr.is_none() && force_component.is_none())
            && !force_attr.unwrap_or(false)
            && !force_component.unwrap_or(false)
        {
            vnode.set_dom(old.dom());
            vnode.set_dom_size(old.dom_size());
            vnode.set_instance(old.instance());
            // Keep the live tree's descriptors, not the unapplied new ones,
            // so the next pass diffs against what is actually rendered.
            if !Rc::ptr_eq(vnode, old) {
                *vnode.attrs_mut() = old.attrs_mut().take();
                *vnode.children_mut() = std::mem::replace(&mut *old.children_mut(), Children::None);
            }
            true
        } else {
            false
        }
    }

    pub(crate) fn set_content_editable(&self, vnode: &VnodeRef) -> Result<(), RenderError> {
        let children = vnode.children();
        match &*children {
            Children::Nodes(list) if list.len() == 1 => {
                if let Some(child) = &list.items()[0] {
                    if matches!(child.tag(), Tag::Trust) {
                        let content = child.children().as_text().unwrap_or("").to_owned();
                        if let Some(dom) = vnode.dom() {
                            if dom.raw_html().as_deref() != Some(content.as_str()) {
                                dom.set_inner_html(self.document(), &content);
                            }
                        }
                        return Ok(());
                    }
                }
                Err(RenderError::ContentEditableChildren)
            }
            Children::Nodes(list) if list.is_empty() => Ok(()),
            Children::None => Ok(()),
            _ => Err(RenderError::ContentEditableChildren),
        }
    }

    fn remove_nodes(
        &self,
        items: &[Option<VnodeRef>],
        start: usize,
        end: usize,
        context: Option<&NodeList>,
        recycling: bool,
    ) {
        let end = end.min(items.len());
        let start = start.min(end);
        for item in items[start..end].iter().flatten() {
            if item.skip() {
                item.set_skip(false);
            } else {
                self.remove_node(item, context, recycling);
            }
        }
    }

    /// Starts removal of one node. `onbeforeremove` hooks may hand back a
    /// deferred; the node only leaves the tree once every deferred settles.
    /// Removal under a recycled parent fires no hooks at all.
    pub(crate) fn remove_node(
        &self,
        vnode: &VnodeRef,
        context: Option<&NodeList>,
        recycling: bool,
    ) {
        let removal = Rc::new(Removal {
            vnode: vnode.clone(),
            original_state: vnode.state(),
            recycling,
            pool: pool_for(vnode, context),
            expected: Cell::new(1),
            called: Cell::new(0),
        });
        if !recycling {
            let hook = vnode
                .attrs()
                .as_ref()
                .and_then(|attrs| attrs.hooks.onbeforeremove.clone());
            if let Some(hook) = hook {
                let result = hook(vnode);
                check_state(vnode, &removal.original_state);
                if let Some(deferred) = result {
                    removal.expected.set(removal.expected.get() + 1);
                    let removal = removal.clone();
                    deferred.on_settled(move || removal.settle());
                }
            }
            if vnode.tag().is_component() {
                if let Some(state) = vnode.state() {
                    let result =
                        state.with_component(|component| component.onbeforeremove(vnode));
                    check_state(vnode, &removal.original_state);
                    if let Some(deferred) = result {
                        removal.expected.set(removal.expected.get() + 1);
                        let removal = removal.clone();
                        deferred.on_settled(move || removal.settle());
                    }
                }
            }
        }
        removal.settle();
    }

    /// Gathers a multi-node run into a fragment so it can move as a block;
    /// single live nodes move directly.
    fn to_fragment(&self, vnode: &VnodeRef) -> NodeRef {
        let count = vnode.dom_size();
        let dom = vnode.dom();
        match (count, dom) {
            (None, Some(dom)) => dom,
            (count, dom) => {
                let fragment = self.document().create_fragment();
                if let (Some(count), Some(dom)) = (count, dom) {
                    if count > 0 {
                        let mut run = vec![dom.clone()];
                        let mut cursor = dom;
                        for _ in 1..count {
                            match cursor.next_sibling() {
                                Some(next) => {
                                    run.push(next.clone());
                                    cursor = next;
                                }
                                None => break,
                            }
                        }
                        for node in run {
                            fragment.append_child(&node);
                        }
                    }
                }
                fragment
            }
        }
    }
}

/// Bookkeeping for one (possibly deferred) removal: how many settlement
/// calls are expected and how many have arrived.
struct Removal {
    vnode: VnodeRef,
    original_state: Option<Rc<ComponentState>>,
    recycling: bool,
    pool: Option<PoolCell>,
    expected: Cell<usize>,
    called: Cell<usize>,
}

impl Removal {
    fn settle(&self) {
        self.called.set(self.called.get() + 1);
        if self.called.get() != self.expected.get() {
            return;
        }
        let vnode = &self.vnode;
        if !self.recycling {
            check_state(vnode, &self.original_state);
            fire_onremove(vnode);
        }
        if let Some(dom) = vnode.dom() {
            let count = vnode.dom_size().unwrap_or(1);
            let mut run = vec![dom.clone()];
            let mut cursor = dom;
            for _ in 1..count {
                match cursor.next_sibling() {
                    Some(next) => {
                        run.push(next.clone());
                        cursor = next;
                    }
                    None => break,
                }
            }
            for node in run {
                node.remove_from_parent();
            }
            if let Some(pool) = &self.pool {
                pool.borrow_mut().push(vnode.clone());
            }
        }
    }
}

/// Depth-first `onremove`, parent before children.
fn fire_onremove(vnode: &VnodeRef) {
    let original = vnode.state();
    let hook = vnode
        .attrs()
        .as_ref()
        .and_then(|attrs| attrs.hooks.onremove.clone());
    if let Some(hook) = hook {
        hook(vnode);
        check_state(vnode, &original);
    }
    if vnode.tag().is_component() {
        if let Some(state) = vnode.state() {
            state.with_component(|component| component.onremove(vnode));
            check_state(vnode, &original);
        }
        if let Some(instance) = vnode.instance() {
            fire_onremove(&instance);
        }
    } else {
        let children = vnode.children();
        if let Some(list) = children.as_nodes() {
            for child in list.items().iter().flatten() {
                fire_onremove(child);
            }
        }
    }
}

/// A removed node is pool-eligible when the new list exists, the node is a
/// single-node text or element, and no external-integration hooks ride on
/// it.
fn pool_for(vnode: &VnodeRef, context: Option<&NodeList>) -> Option<PoolCell> {
    let context = context?;
    if vnode.dom_size().is_some() {
        return None;
    }
    if !matches!(vnode.tag(), Tag::Element(_) | Tag::Text) {
        return None;
    }
    let clean = vnode
        .attrs()
        .as_ref()
        .map_or(true, |attrs| !attrs.hooks.has_integration_hooks());
    if !clean {
        return None;
    }
    Some(context.ensure_pool())
}

fn add_to_pool(vnode: &VnodeRef, context: Option<&NodeList>) {
    if let Some(pool) = pool_for(vnode, context) {
        pool.borrow_mut().push(vnode.clone());
    }
}

/// Pool activation heuristic: the pool competes with the surviving old list
/// on length closeness, then on the child count of the respective first
/// items.
fn is_recyclable(
    old_items: &[Option<VnodeRef>],
    pool: &[VnodeRef],
    new_items: &[Option<VnodeRef>],
) -> bool {
    let old_len = old_items.len() as isize;
    let pool_len = pool.len() as isize;
    let new_len = new_items.len() as isize;
    if (pool_len - new_len).abs() > (old_len - new_len).abs() {
        return false;
    }
    let old_children = old_items
        .first()
        .and_then(|slot| slot.as_ref())
        .map_or(0, |v| children_len(v)) as isize;
    let pool_children = pool.first().map_or(0, |v| children_len(v)) as isize;
    let new_children = new_items
        .first()
        .and_then(|slot| slot.as_ref())
        .map_or(0, |v| children_len(v)) as isize;
    (pool_children - new_children).abs() <= (old_children - new_children).abs()
}

fn children_len(vnode: &VnodeRef) -> usize {
    match &*vnode.children() {
        Children::None => 0,
        Children::Text(text) => text.len(),
        Children::Nodes(list) => list.len(),
    }
}

fn get_key_map(items: &[Option<VnodeRef>], end: usize) -> HashMap<arbor_core::Key, usize> {
    let mut map = HashMap::default();
    for (index, item) in items[..end].iter().enumerate() {
        if let Some(vnode) = item {
            if let Some(key) = vnode.key() {
                map.insert(key.clone(), index);
            }
        }
    }
    map
}

/// First live node at or after `start` (ignoring pooled entries past
/// `limit`), falling back to the inherited anchor.
fn get_next_sibling(
    items: &[Option<VnodeRef>],
    start: usize,
    limit: usize,
    next_sibling: Option<NodeRef>,
) -> Option<NodeRef> {
    for item in items[start.min(limit)..limit].iter().flatten() {
        if let Some(dom) = item.dom() {
            return Some(dom);
        }
    }
    next_sibling
}

fn insert_node(parent: &NodeRef, dom: &NodeRef, next_sibling: Option<&NodeRef>) {
    parent.insert_before(dom, next_sibling);
}

fn init_attr_lifecycle(hooks: &Hooks, vnode: &VnodeRef, out: &mut HookQueue) {
    let original = vnode.state();
    if let Some(oninit) = &hooks.oninit {
        oninit(vnode);
        check_state(vnode, &original);
    }
    if let Some(oncreate) = &hooks.oncreate {
        let hook = oncreate.clone();
        let vnode = vnode.clone();
        out.push(Box::new(move || hook(&vnode)));
    }
}

fn update_attr_lifecycle(hooks: &Hooks, vnode: &VnodeRef, out: &mut HookQueue) {
    if let Some(onupdate) = &hooks.onupdate {
        let hook = onupdate.clone();
        let vnode = vnode.clone();
        out.push(Box::new(move || hook(&vnode)));
    }
}

fn update_text(old: &VnodeRef, vnode: &VnodeRef) {
    let old_text = old.children().as_text().unwrap_or("").to_owned();
    let new_text = vnode.children().as_text().unwrap_or("").to_owned();
    if old_text != new_text {
        if let Some(dom) = old.dom() {
            dom.set_node_value(&new_text);
        }
    }
    vnode.set_dom(old.dom());
}

/// A textarea's managed text is really its `value`.
fn hoist_textarea_value(vnode: &VnodeRef) {
    if vnode.tag().element_name() != Some("textarea") {
        return;
    }
    let text = match &*vnode.children() {
        Children::Text(text) => Some(text.clone()),
        _ => None,
    };
    if let Some(text) = text {
        vnode
            .attrs_mut()
            .get_or_insert_with(Attrs::new)
            .set("value", text);
        *vnode.children_mut() = Children::None;
    }
}

fn element_namespace(vnode: &VnodeRef, inherited: Option<&str>) -> Option<String> {
    if let Some(xmlns) = vnode.attrs().as_ref().and_then(|attrs| attrs.xmlns()) {
        return Some(xmlns.to_owned());
    }
    match vnode.tag().element_name() {
        Some("svg") => Some(SVG_NS.to_owned()),
        Some("math") => Some(MATHML_NS.to_owned()),
        _ => inherited.map(str::to_owned),
    }
}

fn leading_tag_name(markup: &str) -> Option<String> {
    let rest = markup.trim_start().strip_prefix('<')?;
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name.to_ascii_lowercase())
    }
}

/// Scratch-container tag for markup that only parses inside a specific
/// parent element.
fn scratch_parent(tag: &str) -> Option<&'static str> {
    match tag {
        "caption" | "thead" | "tbody" | "tfoot" | "colgroup" => Some("table"),
        "tr" => Some("tbody"),
        "th" | "td" => Some("tr"),
        "col" => Some("colgroup"),
        _ => None,
    }
}
