//! Functions exported by the runtime support library. Every primitive takes
//! and returns 32-bit integers; arrays, strings and files are integer handles
//! owned by the runtime.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Primitive {
    pub name: &'static str,
    pub arity: usize,
}

const fn prim(name: &'static str, arity: usize) -> Primitive {
    Primitive { name, arity }
}

pub const PRIMITIVES: &[Primitive] = &[
    // arrays
    prim("newarray", 0),
    prim("freearray", 1),
    prim("getarraypos", 2),
    prim("setarraypos", 3),
    prim("arrayfront", 1),
    prim("arrayback", 1),
    prim("arrayempty", 1),
    prim("arraylen", 1),
    prim("arraycapacity", 1),
    prim("arrayclear", 1),
    prim("arraypush", 2),
    prim("arraypop", 1),
    prim("arrayresize", 2),
    // reals, passed around as their bit patterns
    prim("inttoreal", 1),
    prim("realtoint", 1),
    prim("realisnan", 1),
    prim("realadd", 2),
    prim("realsub", 2),
    prim("realmul", 2),
    prim("realdiv", 2),
    prim("realless", 2),
    prim("reallesseq", 2),
    prim("realgreat", 2),
    prim("realgreateq", 2),
    prim("realabs", 1),
    prim("realmod", 2),
    prim("realpow", 2),
    prim("realsqrt", 1),
    prim("realmax", 2),
    prim("realmin", 2),
    prim("realexp", 1),
    prim("realexp2", 1),
    prim("reallog", 1),
    prim("reallog10", 1),
    prim("reallog2", 1),
    prim("realsin", 1),
    prim("realcos", 1),
    prim("realtan", 1),
    prim("realasin", 1),
    prim("realacos", 1),
    prim("realatan", 1),
    prim("realsinh", 1),
    prim("realcosh", 1),
    prim("realtanh", 1),
    prim("realasinh", 1),
    prim("realacosh", 1),
    prim("realatanh", 1),
    prim("realceil", 1),
    prim("realfloor", 1),
    // console and files
    prim("read", 0),
    prim("write", 1),
    prim("writeln", 1),
    prim("print", 1),
    prim("println", 1),
    prim("getfloat", 0),
    prim("putfloat", 1),
    prim("getstd", 1),
    prim("flush", 1),
    prim("open", 2),
    prim("close", 1),
    prim("readfile", 4),
    prim("writefile", 4),
    prim("readchar", 1),
    prim("writechar", 2),
    prim("readstring", 3),
    prim("writestring", 2),
    prim("tell", 1),
    prim("seek", 3),
    // bitwise and logic
    prim("and", 2),
    prim("or", 2),
    prim("not", 1),
    prim("xor", 2),
    prim("shl", 2),
    prim("shr", 2),
    prim("mod", 2),
    prim("logicand", 2),
    prim("logicor", 2),
    prim("logicnot", 1),
    // strings
    prim("newstring", 1),
    prim("freestring", 1),
    prim("getstringpos", 2),
    prim("setstringpos", 3),
    prim("stringlen", 1),
    prim("stringadd", 2),
    prim("stringconcat", 2),
    prim("stringcompare", 2),
    prim("stringassign", 2),
    prim("stringtoint", 1),
    prim("inttostring", 1),
    prim("stringtoreal", 1),
    prim("realtostring", 1),
    // system
    prim("quit", 1),
    prim("getargcount", 0),
    prim("getargvalue", 1),
    prim("randomize", 1),
    prim("getrand", 0),
    prim("timestamp", 0),
];

pub fn lookup(name: &str) -> Option<Primitive> {
    PRIMITIVES.iter().find(|p| p.name == name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique_lowercase_identifiers() {
        let mut seen = HashSet::new();
        for p in PRIMITIVES {
            assert!(seen.insert(p.name), "duplicate primitive {}", p.name);
            assert!(p.name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
            assert!(p.name.starts_with(|c: char| c.is_ascii_alphabetic()));
        }
    }

    #[test]
    fn lookup_reports_arity() {
        assert_eq!(lookup("write").map(|p| p.arity), Some(1));
        assert_eq!(lookup("readfile").map(|p| p.arity), Some(4));
        assert_eq!(lookup("begin"), None);
    }
}
