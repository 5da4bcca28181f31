//! Descriptor and generic signature rewriting.
//!
//! Both functions take a class-name mapping closure and rewrite every
//! class reference they find, leaving primitive types, type variables and
//! type parameter names untouched.

use crate::error::{MappingError, MappingResult};

/// Rewrite every class name in a field or method descriptor.
pub fn remap_descriptor(descriptor: &str, map: &dyn Fn(&str) -> String) -> MappingResult<String> {
    let mut out = String::with_capacity(descriptor.len());
    let mut rest = descriptor;
    let mut offset = 0;
    while let Some(c) = rest.chars().next() {
        match c {
            'L' => {
                let end = rest.find(';').ok_or_else(|| MappingError::Malformed {
                    kind: "descriptor",
                    text: descriptor.to_string(),
                    offset,
                })?;
                out.push('L');
                out.push_str(&map(&rest[1..end]));
                out.push(';');
                offset += end + 1;
                rest = &rest[end + 1..];
            }
            'B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z' | 'V' | '[' | '(' | ')' => {
                out.push(c);
                offset += 1;
                rest = &rest[1..];
            }
            _ => {
                return Err(MappingError::Malformed {
                    kind: "descriptor",
                    text: descriptor.to_string(),
                    offset,
                })
            }
        }
    }
    Ok(out)
}

/// Rewrite every class name in a class, method or field generic signature.
pub fn remap_signature(signature: &str, map: &dyn Fn(&str) -> String) -> MappingResult<String> {
    let mut parser = SignatureRemapper {
        text: signature,
        pos: 0,
        out: String::with_capacity(signature.len()),
        map,
    };
    parser.signature()?;
    Ok(parser.out)
}

struct SignatureRemapper<'a> {
    text: &'a str,
    pos: usize,
    out: String,
    map: &'a dyn Fn(&str) -> String,
}

impl SignatureRemapper<'_> {
    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn error(&self) -> MappingError {
        MappingError::Malformed {
            kind: "signature",
            text: self.text.to_string(),
            offset: self.pos,
        }
    }

    fn expect(&mut self, c: u8) -> MappingResult<()> {
        if self.peek() != Some(c) {
            return Err(self.error());
        }
        self.out.push(c as char);
        self.pos += 1;
        Ok(())
    }

    /// Copy input up to (not including) the first byte in `stops`.
    fn take_until(&mut self, stops: &[u8]) -> MappingResult<&str> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if stops.contains(&c) {
                return Ok(&self.text[start..self.pos]);
            }
            self.pos += 1;
        }
        Err(self.error())
    }

    fn signature(&mut self) -> MappingResult<()> {
        if self.peek() == Some(b'<') {
            self.type_parameters()?;
        }
        if self.peek() == Some(b'(') {
            self.expect(b'(')?;
            while self.peek() != Some(b')') {
                self.java_type()?;
            }
            self.expect(b')')?;
            if self.peek() == Some(b'V') {
                self.expect(b'V')?;
            } else {
                self.java_type()?;
            }
            while self.peek() == Some(b'^') {
                self.expect(b'^')?;
                self.reference_type()?;
            }
        } else {
            // superclass followed by interfaces, or a single field type
            while self.peek().is_some() {
                self.reference_type()?;
            }
        }
        if self.pos != self.text.len() {
            return Err(self.error());
        }
        Ok(())
    }

    fn type_parameters(&mut self) -> MappingResult<()> {
        self.expect(b'<')?;
        while self.peek() != Some(b'>') {
            let name = self.take_until(b":")?.to_string();
            if name.is_empty() {
                return Err(self.error());
            }
            self.out.push_str(&name);
            self.expect(b':')?;
            // class bound is optional, interface bounds follow with ':'
            if matches!(self.peek(), Some(b'L' | b'T' | b'[')) {
                self.reference_type()?;
            }
            while self.peek() == Some(b':') {
                self.expect(b':')?;
                self.reference_type()?;
            }
        }
        self.expect(b'>')
    }

    fn java_type(&mut self) -> MappingResult<()> {
        match self.peek() {
            Some(c @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z')) => self.expect(c),
            _ => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> MappingResult<()> {
        match self.peek() {
            Some(b'L') => self.class_type(),
            Some(b'T') => {
                let var = self.take_until(b";")?.to_string();
                self.out.push_str(&var);
                self.expect(b';')
            }
            Some(b'[') => {
                self.expect(b'[')?;
                self.java_type()
            }
            _ => Err(self.error()),
        }
    }

    fn class_type(&mut self) -> MappingResult<()> {
        self.pos += 1;
        self.out.push('L');
        let mut source = self.take_until(b"<.;")?.to_string();
        let mut mapped = (self.map)(&source);
        self.out.push_str(&mapped);
        if self.peek() == Some(b'<') {
            self.type_arguments()?;
        }
        while self.peek() == Some(b'.') {
            self.expect(b'.')?;
            let simple = self.take_until(b"<.;")?.to_string();
            source = format!("{source}${simple}");
            let inner = (self.map)(&source);
            let suffix = inner
                .strip_prefix(mapped.as_str())
                .and_then(|rest| rest.strip_prefix('$'))
                .or_else(|| inner.rsplit('$').next())
                .unwrap_or(simple.as_str())
                .to_string();
            self.out.push_str(&suffix);
            mapped = inner;
            if self.peek() == Some(b'<') {
                self.type_arguments()?;
            }
        }
        self.expect(b';')
    }

    fn type_arguments(&mut self) -> MappingResult<()> {
        self.expect(b'<')?;
        while self.peek() != Some(b'>') {
            match self.peek() {
                Some(b'*') => self.expect(b'*')?,
                Some(c @ (b'+' | b'-')) => {
                    self.expect(c)?;
                    self.reference_type()?;
                }
                Some(_) => self.reference_type()?,
                None => return Err(self.error()),
            }
        }
        self.expect(b'>')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rename(name: &str) -> String {
        match name {
            "a/Foo" => "x/Bar".into(),
            "a/Foo$Inner" => "x/Bar$Nested".into(),
            other => other.to_string(),
        }
    }

    #[test]
    fn descriptor_classes_are_renamed() {
        assert_eq!(
            remap_descriptor("(ILa/Foo;[La/Foo$Inner;)La/Foo;", &rename).unwrap(),
            "(ILx/Bar;[Lx/Bar$Nested;)Lx/Bar;"
        );
        assert_eq!(remap_descriptor("[[J", &rename).unwrap(), "[[J");
    }

    #[test]
    fn unterminated_descriptor_fails() {
        assert!(matches!(
            remap_descriptor("(La/Foo)V", &rename),
            Err(MappingError::Malformed { kind: "descriptor", .. })
        ));
    }

    #[test]
    fn class_signature_with_type_parameters() {
        // a type parameter literally named L must not be taken as a class
        let sig = "<L:La/Foo;T::Ljava/lang/Comparable<TT;>;>La/Foo;Ljava/util/List<-La/Foo;>;";
        assert_eq!(
            remap_signature(sig, &rename).unwrap(),
            "<L:Lx/Bar;T::Ljava/lang/Comparable<TT;>;>Lx/Bar;Ljava/util/List<-Lx/Bar;>;"
        );
    }

    #[test]
    fn method_signature_with_throws_and_inner_types() {
        let sig = "<E:Ljava/lang/Exception;>(La/Foo<*>.Inner<TE;>;[I)TE;^TE;^La/Foo;";
        assert_eq!(
            remap_signature(sig, &rename).unwrap(),
            "<E:Ljava/lang/Exception;>(Lx/Bar<*>.Nested<TE;>;[I)TE;^TE;^Lx/Bar;"
        );
    }

    #[test]
    fn field_signature_with_wildcards() {
        assert_eq!(
            remap_signature("Ljava/util/Map<+La/Foo;[La/Foo;>;", &rename).unwrap(),
            "Ljava/util/Map<+Lx/Bar;[Lx/Bar;>;"
        );
    }

    #[test]
    fn truncated_signature_fails() {
        assert!(remap_signature("Ljava/util/List<La/Foo;", &rename).is_err());
    }

    proptest! {
        #[test]
        fn identity_map_preserves_descriptors(
            params in prop::collection::vec("(\\[{0,2})([BCDFIJSZ]|L[a-z]{1,4}(/[A-Z][a-z]{0,4}){1,2};)", 0..6),
            ret in "V|I|Lq/R;",
        ) {
            let descriptor = format!("({}){}", params.concat(), ret);
            let same = remap_descriptor(&descriptor, &|n: &str| n.to_string()).unwrap();
            prop_assert_eq!(same, descriptor);
        }

        #[test]
        fn renaming_is_reversible(pkg in "[a-z]{1,6}", class in "[A-Z][a-z]{0,6}") {
            let source = format!("{pkg}/{class}");
            let target = format!("mapped/{class}");
            let descriptor = format!("(L{source};I)[L{source};");
            let forward = remap_descriptor(&descriptor, &|n: &str| if n == source { target.clone() } else { n.to_string() }).unwrap();
            let back = remap_descriptor(&forward, &|n: &str| if n == target { source.clone() } else { n.to_string() }).unwrap();
            prop_assert_eq!(back, descriptor);
        }
    }
}
