//! Names owned by the PHP runtime that must never be relocated.

/// Built-in classes and interfaces. A dependency that declares one of these
/// globally is polyfilling the runtime and must keep the real name.
pub const BUILTIN_TYPES: &[&str] = &[
    "stdClass", "Exception", "ErrorException", "Error", "TypeError", "ValueError",
    "ArithmeticError", "DivisionByZeroError", "ParseError", "Throwable",
    "RuntimeException", "LogicException", "InvalidArgumentException",
    "BadMethodCallException", "BadFunctionCallException", "DomainException",
    "LengthException", "OutOfBoundsException", "OutOfRangeException",
    "OverflowException", "RangeException", "UnderflowException",
    "UnexpectedValueException",
    "Iterator", "IteratorAggregate", "ArrayAccess", "Serializable",
    "Countable", "Traversable", "JsonSerializable", "Stringable",
    "Generator", "Closure", "Fiber",
    "DateTime", "DateTimeImmutable", "DateTimeInterface", "DateTimeZone",
    "DateInterval", "DatePeriod",
    "SplFileInfo", "SplFileObject", "SplTempFileObject",
    "SplDoublyLinkedList", "SplStack", "SplQueue", "SplHeap",
    "SplMaxHeap", "SplMinHeap", "SplPriorityQueue", "SplFixedArray",
    "SplObjectStorage",
    "ArrayObject", "ArrayIterator", "RecursiveArrayIterator",
    "DirectoryIterator", "FilesystemIterator", "GlobIterator",
    "RecursiveDirectoryIterator", "RecursiveIteratorIterator",
    "RegexIterator", "RecursiveRegexIterator",
    "PDO", "PDOStatement", "PDOException",
    "SimpleXMLElement", "DOMDocument", "DOMElement", "DOMNode",
    "ReflectionClass", "ReflectionMethod", "ReflectionFunction",
    "ReflectionProperty", "ReflectionParameter", "ReflectionType",
    "WeakReference", "WeakMap",
    "CurlHandle", "CurlMultiHandle",
];

/// Built-in constants.
pub const BUILTIN_CONSTANTS: &[&str] = &[
    "PHP_EOL", "PHP_INT_MAX", "PHP_INT_MIN", "PHP_INT_SIZE",
    "PHP_FLOAT_MAX", "PHP_FLOAT_MIN", "PHP_FLOAT_DIG", "PHP_FLOAT_EPSILON",
    "PHP_VERSION", "PHP_MAJOR_VERSION", "PHP_MINOR_VERSION", "PHP_RELEASE_VERSION",
    "PHP_OS", "PHP_OS_FAMILY", "PHP_SAPI", "PHP_MAXPATHLEN",
    "PHP_PREFIX", "PHP_BINDIR", "PHP_LIBDIR", "PHP_DATADIR",
    "PHP_EXTENSION_DIR", "PHP_CONFIG_FILE_PATH",
    "DIRECTORY_SEPARATOR", "PATH_SEPARATOR",
    "TRUE", "FALSE", "NULL",
    "STDIN", "STDOUT", "STDERR",
    "E_ALL", "E_ERROR", "E_WARNING", "E_NOTICE", "E_STRICT",
    "E_DEPRECATED", "E_USER_ERROR", "E_USER_WARNING", "E_USER_NOTICE",
    "FILE_APPEND", "FILE_IGNORE_NEW_LINES", "FILE_SKIP_EMPTY_LINES",
    "FILE_USE_INCLUDE_PATH", "LOCK_EX", "LOCK_SH", "LOCK_UN",
    "SORT_REGULAR", "SORT_NUMERIC", "SORT_STRING", "SORT_ASC", "SORT_DESC",
    "ARRAY_FILTER_USE_BOTH", "ARRAY_FILTER_USE_KEY",
    "JSON_THROW_ON_ERROR", "JSON_PRETTY_PRINT", "JSON_UNESCAPED_SLASHES",
    "JSON_UNESCAPED_UNICODE", "JSON_FORCE_OBJECT",
    "PREG_SPLIT_NO_EMPTY", "PREG_SET_ORDER", "PREG_OFFSET_CAPTURE",
    "GLOB_BRACE", "GLOB_MARK", "GLOB_NOSORT", "GLOB_NOCHECK",
    "SEEK_SET", "SEEK_CUR", "SEEK_END",
];

/// True if `name` is a runtime class or interface.
pub fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

/// True if `name` is a runtime constant.
pub fn is_builtin_constant(name: &str) -> bool {
    BUILTIN_CONSTANTS.contains(&name)
}
